//! The match-pattern compiler. Patterns are a separate, much smaller
//! grammar than XPath, so they are parsed here; embedded predicates are
//! handed to the XPath facade as opaque expressions.

use rust_decimal::Decimal;

use xsltc_ast::pattern::{
    Axis, ElementTest, KindTest, NameTest, NodeTest, Pattern, RootArgument, RootCall,
    RootFunction, Step,
};
use xsltc_ast::{Error, ErrorCode, Result};
use xsltc_name::Name;

use crate::xpath::{StaticContext, XPathFacade};

pub(crate) struct PatternParser<'a, X: XPathFacade> {
    pub facade: &'a X,
    pub ctx: &'a StaticContext,
    /// The effective XSLT version; 2.0 stylesheets reject some forms.
    pub version: Decimal,
}

impl<'a, X: XPathFacade> PatternParser<'a, X> {
    pub(crate) fn new(facade: &'a X, ctx: &'a StaticContext, version: Decimal) -> Self {
        Self {
            facade,
            ctx,
            version,
        }
    }

    pub(crate) fn parse(&self, source: &str) -> Result<Pattern<X::Expr>> {
        let tokens = lex(source)?;
        let mut cursor = Cursor {
            parser: self,
            tokens,
            position: 0,
        };
        let pattern = cursor.union_pattern()?;
        if cursor.position != cursor.tokens.len() {
            return Err(syntax(format!("unexpected content in pattern '{}'", source)));
        }
        Ok(pattern)
    }

    fn xslt_30(&self) -> bool {
        self.version >= Decimal::new(30, 1)
    }
}

fn syntax(message: impl Into<String>) -> Error {
    Error::new(ErrorCode::XPST0003, message)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    Pipe,
    At,
    Dot,
    DotDot,
    Dollar,
    Comma,
    LeftParen,
    RightParen,
    AxisSeparator,
    Star,
    /// `prefix:*`
    NamespaceStar(String),
    /// `*:local`
    LocalStar(String),
    /// A lexical QName or NCName.
    Name(String),
    /// `Q{uri}local`
    UriQualified(String, String),
    StringLiteral(String),
    Number(Decimal),
    /// The source between a balanced `[` `]` pair.
    Predicate(String),
}

fn lex(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '/' => {
                if matches!(chars.peek(), Some((_, '/'))) {
                    chars.next();
                    tokens.push(Token::DoubleSlash);
                } else {
                    tokens.push(Token::Slash);
                }
            }
            '|' => tokens.push(Token::Pipe),
            '@' => tokens.push(Token::At),
            ',' => tokens.push(Token::Comma),
            '(' => tokens.push(Token::LeftParen),
            ')' => tokens.push(Token::RightParen),
            '$' => tokens.push(Token::Dollar),
            '.' => {
                if matches!(chars.peek(), Some((_, '.'))) {
                    chars.next();
                    tokens.push(Token::DotDot);
                } else {
                    tokens.push(Token::Dot);
                }
            }
            ':' => {
                if matches!(chars.peek(), Some((_, ':'))) {
                    chars.next();
                    tokens.push(Token::AxisSeparator);
                } else {
                    return Err(syntax(format!("stray ':' at offset {}", i)));
                }
            }
            '[' => {
                let mut depth = 1usize;
                let start = i + 1;
                let mut end = None;
                while let Some((j, d)) = chars.next() {
                    match d {
                        '[' => depth += 1,
                        ']' => {
                            depth -= 1;
                            if depth == 0 {
                                end = Some(j);
                                break;
                            }
                        }
                        '\'' | '"' => {
                            for (_, e) in chars.by_ref() {
                                if e == d {
                                    break;
                                }
                            }
                        }
                        _ => {}
                    }
                }
                match end {
                    Some(end) => tokens.push(Token::Predicate(source[start..end].to_string())),
                    None => return Err(syntax("unclosed '[' in pattern")),
                }
            }
            '\'' | '"' => {
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, d)) = chars.next() {
                    if d == c {
                        if matches!(chars.peek(), Some((_, e)) if *e == c) {
                            chars.next();
                            text.push(c);
                        } else {
                            closed = true;
                            break;
                        }
                    } else {
                        text.push(d);
                    }
                }
                if !closed {
                    return Err(syntax("unterminated string literal in pattern"));
                }
                tokens.push(Token::StringLiteral(text));
            }
            '*' => {
                if matches!(chars.peek(), Some((_, ':'))) {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if matches!(lookahead.peek(), Some((_, d)) if is_name_start(*d)) {
                        chars.next();
                        let local = read_ncname(&mut chars);
                        tokens.push(Token::LocalStar(local));
                        continue;
                    }
                }
                tokens.push(Token::Star);
            }
            c if c.is_ascii_digit() => {
                let mut text = String::from(c);
                while let Some((_, d)) = chars.peek() {
                    if d.is_ascii_digit() || *d == '.' {
                        text.push(*d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = text
                    .parse()
                    .map_err(|_| syntax(format!("bad number '{}'", text)))?;
                tokens.push(Token::Number(number));
            }
            'Q' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                let mut uri = String::new();
                let mut closed = false;
                for (_, d) in chars.by_ref() {
                    if d == '}' {
                        closed = true;
                        break;
                    }
                    uri.push(d);
                }
                if !closed {
                    return Err(syntax("unclosed 'Q{' name"));
                }
                let local = read_ncname(&mut chars);
                if local.is_empty() {
                    return Err(syntax("'Q{…}' without a local name"));
                }
                tokens.push(Token::UriQualified(uri.trim().to_string(), local));
            }
            c if is_name_start(c) => {
                let mut name = String::from(c);
                name.push_str(&read_ncname(&mut chars));
                // prefix:* and prefix:local, but not prefix:: (an axis)
                if matches!(chars.peek(), Some((_, ':'))) {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    match lookahead.peek() {
                        Some((_, '*')) => {
                            chars.next();
                            chars.next();
                            tokens.push(Token::NamespaceStar(name));
                            continue;
                        }
                        Some((_, d)) if is_name_start(*d) => {
                            chars.next();
                            name.push(':');
                            name.push_str(&read_ncname(&mut chars));
                        }
                        _ => {}
                    }
                }
                tokens.push(Token::Name(name));
            }
            other => return Err(syntax(format!("character '{}' at offset {}", other, i))),
        }
    }
    Ok(tokens)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn read_ncname(chars: &mut std::iter::Peekable<std::str::CharIndices>) -> String {
    let mut name = String::new();
    while let Some((_, d)) = chars.peek() {
        if d.is_alphanumeric() || *d == '_' || *d == '-' || *d == '.' {
            name.push(*d);
            chars.next();
        } else {
            break;
        }
    }
    name
}

struct Cursor<'a, 'b, X: XPathFacade> {
    parser: &'a PatternParser<'b, X>,
    tokens: Vec<Token>,
    position: usize,
}

impl<X: XPathFacade> Cursor<'_, '_, X> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(name)) if name == word)
            && !matches!(self.tokens.get(self.position + 1), Some(Token::LeftParen))
        {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn union_pattern(&mut self) -> Result<Pattern<X::Expr>> {
        let mut branches = vec![self.intersect_pattern()?];
        loop {
            if self.eat(&Token::Pipe) || self.eat_word("union") {
                branches.push(self.intersect_pattern()?);
            } else {
                break;
            }
        }
        if branches.len() == 1 {
            Ok(branches.pop().expect("one branch"))
        } else {
            Ok(Pattern::Union(branches))
        }
    }

    fn intersect_pattern(&mut self) -> Result<Pattern<X::Expr>> {
        let mut left = self.path_pattern()?;
        loop {
            if self.eat_word("intersect") {
                let right = self.path_pattern()?;
                left = Pattern::Intersect {
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else if self.eat_word("except") {
                let right = self.path_pattern()?;
                left = Pattern::Except {
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn path_pattern(&mut self) -> Result<Pattern<X::Expr>> {
        match self.peek() {
            Some(Token::Slash) => {
                self.next();
                match self.peek() {
                    None
                    | Some(Token::Pipe)
                    | Some(Token::RightParen)
                    | Some(Token::Name(_))
                    | Some(Token::At)
                    | Some(Token::Star)
                    | Some(Token::NamespaceStar(_))
                    | Some(Token::LocalStar(_))
                    | Some(Token::UriQualified(..)) => {}
                    Some(Token::Predicate(_)) => {
                        return Err(syntax("a predicate cannot follow '/' directly"));
                    }
                    Some(Token::DotDot) => {
                        return Err(syntax("'..' is not allowed in a pattern"));
                    }
                    Some(other) => {
                        return Err(syntax(format!("unexpected {:?} after '/'", other)));
                    }
                }
                if self.at_step_start() {
                    self.relative_path(Pattern::Root, true)
                } else {
                    Ok(Pattern::Root)
                }
            }
            Some(Token::DoubleSlash) => {
                self.next();
                if !self.at_step_start() {
                    return Err(syntax("'//' must be followed by a step"));
                }
                self.relative_path(Pattern::Root, false)
            }
            Some(Token::Dollar) => {
                if !self.parser.xslt_30() {
                    return Err(Error::new(
                        ErrorCode::XTSE0340,
                        "variable reference patterns require XSLT 3.0",
                    ));
                }
                self.next();
                let name = match self.next() {
                    Some(Token::Name(name)) => self.resolve_qname(&name, false)?,
                    Some(Token::UriQualified(uri, local)) => Name::uri_qualified(&uri, &local),
                    _ => return Err(syntax("'$' without a variable name")),
                };
                let predicates = self.predicates()?;
                let anchor = Pattern::Variable { name, predicates };
                self.continue_path(anchor)
            }
            Some(Token::LeftParen) => {
                if !self.parser.xslt_30() {
                    return Err(Error::new(
                        ErrorCode::XTSE0340,
                        "parenthesized patterns require XSLT 3.0",
                    ));
                }
                self.next();
                let inner = self.union_pattern()?;
                if !self.eat(&Token::RightParen) {
                    return Err(syntax("expected ')' in pattern"));
                }
                self.continue_path(inner)
            }
            Some(Token::Dot) => {
                self.next();
                let predicates = self.predicates()?;
                Ok(Pattern::AtomicValue { predicates })
            }
            Some(Token::DotDot) => Err(syntax("'..' is not allowed in a pattern")),
            Some(Token::Name(name))
                if matches!(self.tokens.get(self.position + 1), Some(Token::LeftParen))
                    && root_function(name).is_some()
                    && !is_kind_test_name(name) =>
            {
                let function = root_function(name).expect("checked above");
                self.next();
                self.rooted_pattern(function)
            }
            Some(Token::Name(name))
                if matches!(self.tokens.get(self.position + 1), Some(Token::LeftParen))
                    && !is_kind_test_name(name) =>
            {
                Err(Error::new(
                    ErrorCode::XPST0017,
                    format!("{}() cannot start a pattern", name),
                ))
            }
            _ => {
                if !self.at_step_start() {
                    return Err(syntax("expected a pattern step"));
                }
                let step = self.step()?;
                self.continue_path(step)
            }
        }
    }

    /// After an anchoring pattern, fold `/step` and `//step` pairs into
    /// nested Path patterns, left to right.
    fn continue_path(&mut self, anchor: Pattern<X::Expr>) -> Result<Pattern<X::Expr>> {
        let mut current = anchor;
        loop {
            let direct = if self.eat(&Token::Slash) {
                true
            } else if self.eat(&Token::DoubleSlash) {
                false
            } else {
                return Ok(current);
            };
            let step = self.step()?;
            current = Pattern::Path {
                parent: Box::new(current),
                direct,
                step: Box::new(step),
            };
        }
    }

    fn relative_path(
        &mut self,
        anchor: Pattern<X::Expr>,
        direct: bool,
    ) -> Result<Pattern<X::Expr>> {
        let step = self.step()?;
        let current = Pattern::Path {
            parent: Box::new(anchor),
            direct,
            step: Box::new(step),
        };
        self.continue_path(current)
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Name(_)
                    | Token::At
                    | Token::Star
                    | Token::NamespaceStar(_)
                    | Token::LocalStar(_)
                    | Token::UriQualified(..)
            )
        )
    }

    fn rooted_pattern(&mut self, function: RootFunction) -> Result<Pattern<X::Expr>> {
        if function == RootFunction::Doc && !self.parser.xslt_30() {
            return Err(Error::new(
                ErrorCode::XTSE0340,
                "doc() patterns require XSLT 3.0",
            ));
        }
        if !self.eat(&Token::LeftParen) {
            return Err(syntax("expected '(' after pattern function"));
        }
        let mut args = Vec::new();
        if !self.eat(&Token::RightParen) {
            loop {
                args.push(self.root_argument()?);
                if self.eat(&Token::RightParen) {
                    break;
                }
                if !self.eat(&Token::Comma) {
                    return Err(syntax("expected ',' or ')' in pattern function"));
                }
            }
        }
        let expected = match function {
            RootFunction::Id | RootFunction::Doc | RootFunction::ElementWithId => 1,
            RootFunction::Key => 2,
            RootFunction::Root => 0,
        };
        if args.len() != expected {
            return Err(Error::new(
                ErrorCode::XPST0017,
                "wrong number of arguments for pattern function",
            ));
        }
        let predicates = self.predicates()?;
        let anchor = Pattern::Rooted {
            call: RootCall { function, args },
            predicates,
        };
        self.continue_path(anchor)
    }

    /// Only literals and variable references may appear here; anything
    /// else disqualifies the function from starting a pattern.
    fn root_argument(&mut self) -> Result<RootArgument> {
        match self.next() {
            Some(Token::StringLiteral(text)) => Ok(RootArgument::StringLiteral(text)),
            Some(Token::Number(number)) => Ok(RootArgument::NumberLiteral(number)),
            Some(Token::Dollar) => match self.next() {
                Some(Token::Name(name)) => {
                    let name = self.resolve_qname(&name, false)?;
                    Ok(RootArgument::Variable(name))
                }
                Some(Token::UriQualified(uri, local)) => {
                    Ok(RootArgument::Variable(Name::uri_qualified(&uri, &local)))
                }
                _ => Err(syntax("'$' without a variable name")),
            },
            _ => Err(Error::new(
                ErrorCode::XPST0017,
                "pattern function arguments must be literals or variable references",
            )),
        }
    }

    fn step(&mut self) -> Result<Pattern<X::Expr>> {
        let mut axis = Axis::Child;
        if self.eat(&Token::At) {
            axis = Axis::Attribute;
        } else if matches!(self.peek(), Some(Token::Name(name)) if name == "child" || name == "attribute")
            && matches!(self.tokens.get(self.position + 1), Some(Token::AxisSeparator))
        {
            if matches!(self.peek(), Some(Token::Name(name)) if name == "attribute") {
                axis = Axis::Attribute;
            }
            self.next();
            self.next();
        }

        let test = self.node_test(axis)?;
        let predicates = self.predicates()?;
        Ok(Pattern::Step {
            step: Step { axis, test },
            predicates,
        })
    }

    fn node_test(&mut self, axis: Axis) -> Result<NodeTest> {
        match self.next() {
            Some(Token::Star) => Ok(NodeTest::Name(NameTest::Star)),
            Some(Token::NamespaceStar(prefix)) => {
                let uri = self
                    .parser
                    .ctx
                    .namespaces
                    .by_prefix(&prefix)
                    .ok_or_else(|| {
                        Error::new(
                            ErrorCode::XTSE0280,
                            format!("undeclared namespace prefix '{}'", prefix),
                        )
                    })?;
                Ok(NodeTest::Name(NameTest::NamespaceStar(uri.to_string())))
            }
            Some(Token::LocalStar(local)) => Ok(NodeTest::Name(NameTest::LocalStar(local))),
            Some(Token::UriQualified(uri, local)) => Ok(NodeTest::Name(NameTest::Name(
                Name::uri_qualified(&uri, &local),
            ))),
            Some(Token::Name(name)) => {
                if is_kind_test_name(&name)
                    && matches!(self.peek(), Some(Token::LeftParen))
                {
                    self.next();
                    let test = self.kind_test(&name)?;
                    return Ok(NodeTest::Kind(test));
                }
                let name = self.resolve_qname(&name, axis == Axis::Child)?;
                Ok(NodeTest::Name(NameTest::Name(name)))
            }
            other => Err(syntax(format!("expected a node test, found {:?}", other))),
        }
    }

    /// Called with the keyword consumed and the cursor after `(`.
    fn kind_test(&mut self, keyword: &str) -> Result<KindTest> {
        let test = match keyword {
            "node" => {
                self.expect_close()?;
                KindTest::Node
            }
            "text" => {
                self.expect_close()?;
                KindTest::Text
            }
            "comment" => {
                self.expect_close()?;
                KindTest::Comment
            }
            "processing-instruction" => {
                let target = match self.next() {
                    Some(Token::RightParen) => return Ok(KindTest::ProcessingInstruction(None)),
                    Some(Token::Name(name)) => name,
                    Some(Token::StringLiteral(text)) => text.trim().to_string(),
                    _ => return Err(syntax("bad processing-instruction() argument")),
                };
                self.expect_close()?;
                KindTest::ProcessingInstruction(Some(target))
            }
            "element" | "attribute" => {
                let mut test = ElementTest::default();
                match self.next() {
                    Some(Token::RightParen) => {
                        return Ok(if keyword == "element" {
                            KindTest::Element(test)
                        } else {
                            KindTest::Attribute(test)
                        });
                    }
                    Some(Token::Star) => {}
                    Some(Token::Name(name)) => {
                        test.name = Some(self.resolve_qname(&name, keyword == "element")?);
                    }
                    Some(Token::UriQualified(uri, local)) => {
                        test.name = Some(Name::uri_qualified(&uri, &local));
                    }
                    _ => return Err(syntax(format!("bad {}() argument", keyword))),
                }
                if self.eat(&Token::Comma) {
                    match self.next() {
                        Some(Token::Name(name)) => {
                            test.type_name = Some(self.resolve_qname(&name, false)?);
                        }
                        Some(Token::UriQualified(uri, local)) => {
                            test.type_name = Some(Name::uri_qualified(&uri, &local));
                        }
                        _ => return Err(syntax(format!("bad {}() type argument", keyword))),
                    }
                }
                self.expect_close()?;
                if keyword == "element" {
                    KindTest::Element(test)
                } else {
                    KindTest::Attribute(test)
                }
            }
            "schema-element" | "schema-attribute" => {
                let name = match self.next() {
                    Some(Token::Name(name)) => self.resolve_qname(&name, true)?,
                    Some(Token::UriQualified(uri, local)) => Name::uri_qualified(&uri, &local),
                    _ => return Err(syntax(format!("{}() requires a name", keyword))),
                };
                self.expect_close()?;
                if keyword == "schema-element" {
                    KindTest::SchemaElement(name)
                } else {
                    KindTest::SchemaAttribute(name)
                }
            }
            "document-node" => {
                if self.eat(&Token::RightParen) {
                    return Ok(KindTest::Document(None));
                }
                let inner = match self.next() {
                    Some(Token::Name(name))
                        if matches!(name.as_str(), "element" | "schema-element") =>
                    {
                        if !self.eat(&Token::LeftParen) {
                            return Err(syntax("bad document-node() argument"));
                        }
                        self.kind_test(&name)?
                    }
                    _ => return Err(syntax("bad document-node() argument")),
                };
                self.expect_close()?;
                KindTest::Document(Some(Box::new(inner)))
            }
            _ => return Err(syntax(format!("unknown kind test '{}'", keyword))),
        };
        Ok(test)
    }

    fn expect_close(&mut self) -> Result<()> {
        if self.eat(&Token::RightParen) {
            Ok(())
        } else {
            Err(syntax("expected ')' in kind test"))
        }
    }

    fn predicates(&mut self) -> Result<Vec<X::Expr>> {
        let mut predicates = Vec::new();
        while let Some(Token::Predicate(source)) = self.peek() {
            let source = source.clone();
            self.position += 1;
            let expr = self
                .parser
                .facade
                .compile_pattern_predicate(&source, self.parser.ctx)?;
            predicates.push(expr);
        }
        Ok(predicates)
    }

    /// Resolve a lexical QName. The xpath-default-namespace applies to
    /// unprefixed element names only, never to attributes or types.
    fn resolve_qname(&self, lexical: &str, element_name: bool) -> Result<Name> {
        let name = Name::parse_lexical(lexical, &self.parser.ctx.namespaces).ok_or_else(|| {
            Error::new(
                ErrorCode::XTSE0280,
                format!("undeclared namespace prefix in '{}'", lexical),
            )
        })?;
        if element_name && name.prefix().is_none() {
            Ok(name
                .with_default_namespace(Some(self.parser.ctx.default_element_namespace.as_str())))
        } else {
            Ok(name)
        }
    }
}

fn root_function(name: &str) -> Option<RootFunction> {
    match name {
        "id" => Some(RootFunction::Id),
        "key" => Some(RootFunction::Key),
        "doc" => Some(RootFunction::Doc),
        "element-with-id" => Some(RootFunction::ElementWithId),
        "root" => Some(RootFunction::Root),
        _ => None,
    }
}

fn is_kind_test_name(name: &str) -> bool {
    matches!(
        name,
        "node"
            | "text"
            | "comment"
            | "processing-instruction"
            | "element"
            | "attribute"
            | "schema-element"
            | "schema-attribute"
            | "document-node"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xpath::SourceFacade;
    use rust_decimal_macros::dec;
    use xsltc_name::Namespaces;

    fn context() -> StaticContext {
        let mut namespaces = Namespaces::default();
        namespaces.declare("p", "http://example.com/p");
        StaticContext::new(namespaces)
    }

    fn parse(source: &str) -> Result<Pattern<crate::xpath::SourceExpr>> {
        let ctx = context();
        let facade = SourceFacade;
        PatternParser::new(&facade, &ctx, dec!(3.0)).parse(source)
    }

    fn parse_20(source: &str) -> Result<Pattern<crate::xpath::SourceExpr>> {
        let ctx = context();
        let facade = SourceFacade;
        PatternParser::new(&facade, &ctx, dec!(2.0)).parse(source)
    }

    #[test]
    fn test_root() {
        assert_eq!(parse("/").unwrap(), Pattern::Root);
    }

    #[test]
    fn test_simple_name() {
        let pattern = parse("chapter").unwrap();
        assert_eq!(pattern.default_priority(), dec!(0));
        match pattern {
            Pattern::Step { step, predicates } => {
                assert_eq!(step.axis, Axis::Child);
                assert_eq!(
                    step.test,
                    NodeTest::Name(NameTest::Name(Name::unprefixed("chapter")))
                );
                assert!(predicates.is_empty());
            }
            other => panic!("unexpected pattern {:?}", other),
        }
    }

    #[test]
    fn test_prefixed_name_resolves() {
        match parse("p:chapter").unwrap() {
            Pattern::Step { step, .. } => match step.test {
                NodeTest::Name(NameTest::Name(name)) => {
                    assert_eq!(name.namespace(), Some("http://example.com/p"));
                }
                other => panic!("unexpected test {:?}", other),
            },
            other => panic!("unexpected pattern {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_prefix() {
        let error = parse("q:chapter").unwrap_err();
        assert_eq!(error.code, ErrorCode::XTSE0280);
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(parse("*").unwrap().default_priority(), dec!(-0.5));
        assert_eq!(parse("p:*").unwrap().default_priority(), dec!(-0.25));
        assert_eq!(parse("*:local").unwrap().default_priority(), dec!(-0.25));
    }

    #[test]
    fn test_attribute_step() {
        match parse("@id").unwrap() {
            Pattern::Step { step, .. } => assert_eq!(step.axis, Axis::Attribute),
            other => panic!("unexpected pattern {:?}", other),
        }
        match parse("attribute::id").unwrap() {
            Pattern::Step { step, .. } => assert_eq!(step.axis, Axis::Attribute),
            other => panic!("unexpected pattern {:?}", other),
        }
    }

    #[test]
    fn test_kind_tests() {
        assert_eq!(parse("text()").unwrap().default_priority(), dec!(-0.5));
        assert_eq!(
            parse("processing-instruction('x')")
                .unwrap()
                .default_priority(),
            dec!(0)
        );
        assert_eq!(parse("element(foo)").unwrap().default_priority(), dec!(0));
        assert_eq!(
            parse("document-node(element(foo))")
                .unwrap()
                .default_priority(),
            dec!(0)
        );
    }

    #[test]
    fn test_paths() {
        let pattern = parse("a/b").unwrap();
        assert_eq!(pattern.default_priority(), dec!(0.5));
        match pattern {
            Pattern::Path { direct, .. } => assert!(direct),
            other => panic!("unexpected pattern {:?}", other),
        }
        match parse("a//b").unwrap() {
            Pattern::Path { direct, .. } => assert!(!direct),
            other => panic!("unexpected pattern {:?}", other),
        }
        match parse("/a").unwrap() {
            Pattern::Path { parent, .. } => assert_eq!(*parent, Pattern::Root),
            other => panic!("unexpected pattern {:?}", other),
        }
    }

    #[test]
    fn test_predicates() {
        match parse("appendix[2]").unwrap() {
            Pattern::Step { predicates, .. } => {
                assert_eq!(predicates.len(), 1);
                assert_eq!(predicates[0].source, "2");
            }
            other => panic!("unexpected pattern {:?}", other),
        }
    }

    #[test]
    fn test_union_splits() {
        let pattern = parse("chapter | appendix[2]").unwrap();
        let branches = pattern.into_branches();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].default_priority(), dec!(0));
        assert_eq!(branches[1].default_priority(), dec!(0.5));
    }

    #[test]
    fn test_intersect_except() {
        assert!(matches!(
            parse("a intersect b").unwrap(),
            Pattern::Intersect { .. }
        ));
        assert!(matches!(parse("a except b").unwrap(), Pattern::Except { .. }));
    }

    #[test]
    fn test_key_pattern() {
        match parse("key('k', 'v')/a").unwrap() {
            Pattern::Path { parent, .. } => match *parent {
                Pattern::Rooted { call, .. } => {
                    assert_eq!(call.function, RootFunction::Key);
                    assert_eq!(call.args.len(), 2);
                }
                other => panic!("unexpected parent {:?}", other),
            },
            other => panic!("unexpected pattern {:?}", other),
        }
    }

    #[test]
    fn test_key_requires_literal_or_variable() {
        let error = parse("key('k', foo)").unwrap_err();
        assert_eq!(error.code, ErrorCode::XPST0017);
    }

    #[test]
    fn test_disallowed_start_function() {
        let error = parse("contains('a', 'b')").unwrap_err();
        assert_eq!(error.code, ErrorCode::XPST0017);
    }

    #[test]
    fn test_variable_pattern() {
        assert!(matches!(
            parse("$nodes").unwrap(),
            Pattern::Variable { .. }
        ));
        let error = parse_20("$nodes").unwrap_err();
        assert_eq!(error.code, ErrorCode::XTSE0340);
    }

    #[test]
    fn test_xslt_20_restrictions() {
        assert_eq!(parse_20("(a)").unwrap_err().code, ErrorCode::XTSE0340);
        assert_eq!(
            parse_20("doc('u')").unwrap_err().code,
            ErrorCode::XTSE0340
        );
        // parenthesized patterns are fine in 3.0
        assert!(parse("(a)").is_ok());
    }

    #[test]
    fn test_predicate_after_root_rejected() {
        let error = parse("/[1]").unwrap_err();
        assert_eq!(error.code, ErrorCode::XPST0003);
    }

    #[test]
    fn test_atomic_value_pattern() {
        let pattern = parse(".[. = 42]").unwrap();
        match &pattern {
            Pattern::AtomicValue { predicates } => assert_eq!(predicates.len(), 1),
            other => panic!("unexpected pattern {:?}", other),
        }
        assert_eq!(pattern.default_priority(), dec!(1));
        assert_eq!(parse(".").unwrap().default_priority(), dec!(-1));
    }

    #[test]
    fn test_default_element_namespace_applies_to_elements_only() {
        let mut namespaces = Namespaces::default();
        namespaces.declare("p", "http://example.com/p");
        let mut ctx = StaticContext::new(namespaces);
        ctx.default_element_namespace = "http://example.com/d".to_string();
        let facade = SourceFacade;
        let parser = PatternParser::new(&facade, &ctx, dec!(3.0));

        match parser.parse("chapter").unwrap() {
            Pattern::Step { step, .. } => match step.test {
                NodeTest::Name(NameTest::Name(name)) => {
                    assert_eq!(name.namespace(), Some("http://example.com/d"));
                }
                other => panic!("unexpected test {:?}", other),
            },
            other => panic!("unexpected pattern {:?}", other),
        }

        match parser.parse("@id").unwrap() {
            Pattern::Step { step, .. } => match step.test {
                NodeTest::Name(NameTest::Name(name)) => assert_eq!(name.namespace(), None),
                other => panic!("unexpected test {:?}", other),
            },
            other => panic!("unexpected pattern {:?}", other),
        }
    }
}
