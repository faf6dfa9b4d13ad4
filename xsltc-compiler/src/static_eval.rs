//! Compile-time evaluation for use-when attributes, static variables and
//! shadow attributes. A miniature XPath: literals, static variable
//! references, arithmetic, comparisons, and the static function library.
//! Anything beyond that makes the expression unevaluable rather than
//! ill-formed.

use ahash::HashMap;
use rust_decimal::Decimal;
use thiserror::Error;

use xsltc_name::{Name, Namespaces, FN_NAMESPACE, XSLT_NAMESPACE, XS_NAMESPACE};

use crate::names::XsltElement;

#[derive(Debug, Clone, PartialEq)]
pub enum Atomic {
    Boolean(bool),
    String(String),
    Integer(i64),
    Double(f64),
}

impl Atomic {
    pub fn effective_boolean_value(&self) -> bool {
        match self {
            Atomic::Boolean(b) => *b,
            Atomic::String(s) => !s.is_empty(),
            Atomic::Integer(i) => *i != 0,
            Atomic::Double(d) => *d != 0.0 && !d.is_nan(),
        }
    }

    pub fn string_value(&self) -> String {
        match self {
            Atomic::Boolean(b) => b.to_string(),
            Atomic::String(s) => s.clone(),
            Atomic::Integer(i) => i.to_string(),
            Atomic::Double(d) => {
                if d.fract() == 0.0 && d.is_finite() {
                    format!("{}", *d as i64)
                } else {
                    d.to_string()
                }
            }
        }
    }

    fn number_value(&self) -> f64 {
        match self {
            Atomic::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Atomic::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            Atomic::Integer(i) => *i as f64,
            Atomic::Double(d) => *d,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Atomic::Integer(_) | Atomic::Double(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The expression is not well-formed; always a static error.
    #[error("syntax error in static expression: {0}")]
    Syntax(String),
    /// Well-formed but beyond the static subset; the carrying element is
    /// treated as excluded when this arises from use-when.
    #[error("unsupported construct in static expression: {0}")]
    Unsupported(String),
    #[error("unknown variable ${0}")]
    UnknownVariable(String),
    #[error("unknown function {0}()")]
    UnknownFunction(String),
    #[error("wrong number of arguments for {0}()")]
    Arity(String),
}

impl EvalError {
    pub fn is_syntax(&self) -> bool {
        matches!(self, EvalError::Syntax(_))
    }
}

/// The context a static expression sees: previously evaluated static
/// variables, the carrying element's namespace bindings and base URI.
pub struct StaticEvaluator<'a> {
    pub variables: &'a HashMap<Name, Atomic>,
    pub namespaces: &'a Namespaces,
    pub base_uri: Option<&'a str>,
}

impl<'a> StaticEvaluator<'a> {
    pub fn new(
        variables: &'a HashMap<Name, Atomic>,
        namespaces: &'a Namespaces,
        base_uri: Option<&'a str>,
    ) -> Self {
        Self {
            variables,
            namespaces,
            base_uri,
        }
    }

    pub fn evaluate(&self, source: &str) -> Result<Atomic, EvalError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            position: 0,
            evaluator: self,
        };
        let value = parser.expression()?;
        if parser.position != parser.tokens.len() {
            return Err(EvalError::Syntax(format!(
                "unexpected trailing content in '{}'",
                source
            )));
        }
        Ok(value)
    }

    pub fn evaluate_boolean(&self, source: &str) -> Result<bool, EvalError> {
        Ok(self.evaluate(source)?.effective_boolean_value())
    }

    fn call(&self, name: &str, args: Vec<Atomic>) -> Result<Atomic, EvalError> {
        let arity = |n: usize| {
            if args.len() == n {
                Ok(())
            } else {
                Err(EvalError::Arity(name.to_string()))
            }
        };
        match name {
            "true" => {
                arity(0)?;
                Ok(Atomic::Boolean(true))
            }
            "false" => {
                arity(0)?;
                Ok(Atomic::Boolean(false))
            }
            "not" => {
                arity(1)?;
                Ok(Atomic::Boolean(!args[0].effective_boolean_value()))
            }
            "string" => {
                arity(1)?;
                Ok(Atomic::String(args[0].string_value()))
            }
            "number" => {
                arity(1)?;
                Ok(Atomic::Double(args[0].number_value()))
            }
            "boolean" => {
                arity(1)?;
                Ok(Atomic::Boolean(args[0].effective_boolean_value()))
            }
            "concat" => {
                if args.len() < 2 {
                    return Err(EvalError::Arity(name.to_string()));
                }
                Ok(Atomic::String(
                    args.iter().map(Atomic::string_value).collect(),
                ))
            }
            "contains" => {
                arity(2)?;
                Ok(Atomic::Boolean(
                    args[0].string_value().contains(&args[1].string_value()),
                ))
            }
            "starts-with" => {
                arity(2)?;
                Ok(Atomic::Boolean(
                    args[0].string_value().starts_with(&args[1].string_value()),
                ))
            }
            "string-length" => {
                arity(1)?;
                Ok(Atomic::Integer(
                    args[0].string_value().chars().count() as i64
                ))
            }
            "system-property" => {
                arity(1)?;
                self.system_property(&args[0].string_value())
            }
            "function-available" => {
                if args.is_empty() || args.len() > 2 {
                    return Err(EvalError::Arity(name.to_string()));
                }
                self.function_available(&args[0].string_value())
            }
            "element-available" => {
                arity(1)?;
                self.element_available(&args[0].string_value())
            }
            "type-available" => {
                arity(1)?;
                self.type_available(&args[0].string_value())
            }
            "static-base-uri" => {
                arity(0)?;
                match self.base_uri {
                    Some(uri) => Ok(Atomic::String(uri.to_string())),
                    None => Err(EvalError::Unsupported(
                        "no static base URI is available".to_string(),
                    )),
                }
            }
            _ => Err(EvalError::UnknownFunction(name.to_string())),
        }
    }

    fn resolve(&self, lexical: &str) -> Result<Name, EvalError> {
        Name::parse_eqname(lexical, self.namespaces)
            .ok_or_else(|| EvalError::Unsupported(format!("undeclared prefix in '{}'", lexical)))
    }

    fn system_property(&self, lexical: &str) -> Result<Atomic, EvalError> {
        let name = self.resolve(lexical)?;
        let value = if name.namespace() == Some(XSLT_NAMESPACE) {
            match name.local() {
                "version" => "3.0",
                "vendor" => "xsltc",
                "vendor-url" => "https://example.com/xsltc",
                "product-name" => "xsltc",
                "product-version" => env!("CARGO_PKG_VERSION"),
                "is-schema-aware" => "no",
                "supports-serialization" => "no",
                "supports-backwards-compatibility" => "yes",
                "supports-streaming" => "no",
                // an unknown system property is the empty string
                _ => "",
            }
        } else {
            ""
        };
        Ok(Atomic::String(value.to_string()))
    }

    fn function_available(&self, lexical: &str) -> Result<Atomic, EvalError> {
        let name = self.resolve(lexical)?;
        let in_fn_namespace =
            name.namespace().is_none() || name.namespace() == Some(FN_NAMESPACE);
        Ok(Atomic::Boolean(
            in_fn_namespace && STATIC_FUNCTIONS.contains(&name.local()),
        ))
    }

    fn element_available(&self, lexical: &str) -> Result<Atomic, EvalError> {
        let name = self.resolve(lexical)?;
        let available = name.namespace() == Some(XSLT_NAMESPACE)
            && XsltElement::lookup(name.local())
                .is_some_and(|element| !element.is_declaration() && !element.is_root());
        Ok(Atomic::Boolean(available))
    }

    fn type_available(&self, lexical: &str) -> Result<Atomic, EvalError> {
        let name = self.resolve(lexical)?;
        Ok(Atomic::Boolean(
            name.namespace() == Some(XS_NAMESPACE) && BUILTIN_TYPES.contains(&name.local()),
        ))
    }
}

const STATIC_FUNCTIONS: &[&str] = &[
    "boolean",
    "ceiling",
    "concat",
    "contains",
    "count",
    "current",
    "current-date",
    "current-dateTime",
    "current-time",
    "document",
    "element-available",
    "empty",
    "exists",
    "false",
    "floor",
    "format-number",
    "function-available",
    "generate-id",
    "key",
    "last",
    "local-name",
    "lower-case",
    "matches",
    "name",
    "namespace-uri",
    "normalize-space",
    "not",
    "number",
    "position",
    "replace",
    "round",
    "starts-with",
    "static-base-uri",
    "string",
    "string-join",
    "string-length",
    "substring",
    "substring-after",
    "substring-before",
    "sum",
    "system-property",
    "tokenize",
    "translate",
    "true",
    "type-available",
    "upper-case",
];

const BUILTIN_TYPES: &[&str] = &[
    "anyAtomicType",
    "anyURI",
    "base64Binary",
    "boolean",
    "byte",
    "date",
    "dateTime",
    "dayTimeDuration",
    "decimal",
    "double",
    "duration",
    "float",
    "gDay",
    "gMonth",
    "gMonthDay",
    "gYear",
    "gYearMonth",
    "hexBinary",
    "int",
    "integer",
    "language",
    "long",
    "negativeInteger",
    "nonNegativeInteger",
    "nonPositiveInteger",
    "normalizedString",
    "positiveInteger",
    "short",
    "string",
    "time",
    "token",
    "unsignedByte",
    "unsignedInt",
    "unsignedLong",
    "unsignedShort",
    "untypedAtomic",
    "yearMonthDuration",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    String(String),
    Integer(i64),
    Double(f64),
    Name(String),
    Variable(String),
    LeftParen,
    RightParen,
    Comma,
    Plus,
    Minus,
    Star,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '\'' | '"' => {
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some((_, d)) if d == c => {
                            // doubled quotes escape
                            if matches!(chars.peek(), Some((_, e)) if *e == c) {
                                chars.next();
                                text.push(c);
                            } else {
                                break;
                            }
                        }
                        Some((_, d)) => text.push(d),
                        None => {
                            return Err(EvalError::Syntax(format!(
                                "unterminated string literal at offset {}",
                                i
                            )))
                        }
                    }
                }
                tokens.push(Token::String(text));
            }
            '$' => {
                let name = read_name(&mut chars);
                if name.is_empty() {
                    return Err(EvalError::Syntax("'$' without a name".to_string()));
                }
                tokens.push(Token::Variable(name));
            }
            '(' => {
                if matches!(chars.peek(), Some((_, ':'))) {
                    skip_comment(&mut chars)?;
                } else {
                    tokens.push(Token::LeftParen);
                }
            }
            ')' => tokens.push(Token::RightParen),
            ',' => tokens.push(Token::Comma),
            '+' => tokens.push(Token::Plus),
            '-' => tokens.push(Token::Minus),
            '*' => tokens.push(Token::Star),
            '=' => tokens.push(Token::Equal),
            '!' => {
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::NotEqual);
                } else {
                    return Err(EvalError::Syntax("'!' without '='".to_string()));
                }
            }
            '<' => {
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::LessEqual);
                } else {
                    tokens.push(Token::Less);
                }
            }
            '>' => {
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token::GreaterEqual);
                } else {
                    tokens.push(Token::Greater);
                }
            }
            c if c.is_ascii_digit() => {
                let mut text = String::from(c);
                let mut is_double = false;
                while let Some((_, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        text.push(*d);
                        chars.next();
                    } else if *d == '.' && !is_double {
                        is_double = true;
                        text.push(*d);
                        chars.next();
                    } else if *d == 'e' || *d == 'E' {
                        is_double = true;
                        text.push(*d);
                        chars.next();
                        if let Some((_, sign)) = chars.peek() {
                            if *sign == '+' || *sign == '-' {
                                text.push(*sign);
                                chars.next();
                            }
                        }
                    } else {
                        break;
                    }
                }
                if is_double {
                    let value: f64 = text
                        .parse()
                        .map_err(|_| EvalError::Syntax(format!("bad number '{}'", text)))?;
                    tokens.push(Token::Double(value));
                } else {
                    let value: i64 = text
                        .parse()
                        .map_err(|_| EvalError::Syntax(format!("bad number '{}'", text)))?;
                    tokens.push(Token::Integer(value));
                }
            }
            c if is_name_start(c) => {
                let mut name = String::from(c);
                name.push_str(&read_name(&mut chars));
                tokens.push(Token::Name(name));
            }
            other => {
                return Err(EvalError::Unsupported(format!(
                    "character '{}' at offset {}",
                    other, i
                )))
            }
        }
    }
    Ok(tokens)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn read_name(chars: &mut std::iter::Peekable<std::str::CharIndices>) -> String {
    let mut name = String::new();
    while let Some((_, d)) = chars.peek() {
        if d.is_alphanumeric() || *d == '_' || *d == '-' || *d == '.' || *d == ':' || *d == '{'
        {
            // a Q{uri} name swallows the braced part whole
            if *d == '{' {
                for (_, e) in chars.by_ref() {
                    name.push(e);
                    if e == '}' {
                        break;
                    }
                }
                continue;
            }
            name.push(*d);
            chars.next();
        } else {
            break;
        }
    }
    name
}

fn skip_comment(
    chars: &mut std::iter::Peekable<std::str::CharIndices>,
) -> Result<(), EvalError> {
    chars.next();
    let mut depth = 1;
    while depth > 0 {
        match chars.next() {
            Some((_, '(')) if matches!(chars.peek(), Some((_, ':'))) => {
                chars.next();
                depth += 1;
            }
            Some((_, ':')) if matches!(chars.peek(), Some((_, ')'))) => {
                chars.next();
                depth -= 1;
            }
            Some(_) => {}
            None => return Err(EvalError::Syntax("unterminated comment".to_string())),
        }
    }
    Ok(())
}

struct Parser<'a, 'b> {
    tokens: Vec<Token>,
    position: usize,
    evaluator: &'a StaticEvaluator<'b>,
}

impl Parser<'_, '_> {
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
        if matches!(self.peek(), Some(Token::Name(name)) if name == word) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expression(&mut self) -> Result<Atomic, EvalError> {
        let mut left = self.and_expression()?;
        while self.eat_word("or") {
            let right = self.and_expression()?;
            left = Atomic::Boolean(
                left.effective_boolean_value() || right.effective_boolean_value(),
            );
        }
        Ok(left)
    }

    fn and_expression(&mut self) -> Result<Atomic, EvalError> {
        let mut left = self.comparison()?;
        while self.eat_word("and") {
            let right = self.comparison()?;
            left = Atomic::Boolean(
                left.effective_boolean_value() && right.effective_boolean_value(),
            );
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Atomic, EvalError> {
        let left = self.additive()?;
        let ordering = match self.peek() {
            Some(Token::Equal) => Some("="),
            Some(Token::NotEqual) => Some("!="),
            Some(Token::Less) => Some("<"),
            Some(Token::LessEqual) => Some("<="),
            Some(Token::Greater) => Some(">"),
            Some(Token::GreaterEqual) => Some(">="),
            Some(Token::Name(name))
                if matches!(name.as_str(), "eq" | "ne" | "lt" | "le" | "gt" | "ge") =>
            {
                Some(match name.as_str() {
                    "eq" => "=",
                    "ne" => "!=",
                    "lt" => "<",
                    "le" => "<=",
                    "gt" => ">",
                    _ => ">=",
                })
            }
            _ => None,
        };
        let Some(op) = ordering else {
            return Ok(left);
        };
        self.position += 1;
        let right = self.additive()?;
        Ok(Atomic::Boolean(compare(&left, op, &right)))
    }

    fn additive(&mut self) -> Result<Atomic, EvalError> {
        let mut left = self.multiplicative()?;
        loop {
            if self.eat(&Token::Plus) {
                let right = self.multiplicative()?;
                left = arithmetic(&left, '+', &right);
            } else if self.eat(&Token::Minus) {
                let right = self.multiplicative()?;
                left = arithmetic(&left, '-', &right);
            } else {
                return Ok(left);
            }
        }
    }

    fn multiplicative(&mut self) -> Result<Atomic, EvalError> {
        let mut left = self.unary()?;
        loop {
            if self.eat(&Token::Star) {
                let right = self.unary()?;
                left = arithmetic(&left, '*', &right);
            } else if self.eat_word("div") {
                let right = self.unary()?;
                left = Atomic::Double(left.number_value() / right.number_value());
            } else if self.eat_word("idiv") {
                let right = self.unary()?;
                let divisor = right.number_value();
                if divisor == 0.0 {
                    return Err(EvalError::Unsupported("division by zero".to_string()));
                }
                left = Atomic::Integer((left.number_value() / divisor).trunc() as i64);
            } else if self.eat_word("mod") {
                let right = self.unary()?;
                left = Atomic::Double(left.number_value() % right.number_value());
            } else {
                return Ok(left);
            }
        }
    }

    fn unary(&mut self) -> Result<Atomic, EvalError> {
        if self.eat(&Token::Minus) {
            let value = self.unary()?;
            return Ok(match value {
                Atomic::Integer(i) => Atomic::Integer(-i),
                other => Atomic::Double(-other.number_value()),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Atomic, EvalError> {
        match self.next() {
            Some(Token::String(s)) => Ok(Atomic::String(s)),
            Some(Token::Integer(i)) => Ok(Atomic::Integer(i)),
            Some(Token::Double(d)) => Ok(Atomic::Double(d)),
            Some(Token::Variable(lexical)) => {
                let name = self
                    .evaluator
                    .resolve(&lexical)
                    .map_err(|_| EvalError::UnknownVariable(lexical.clone()))?;
                self.evaluator
                    .variables
                    .get(&name)
                    .cloned()
                    .ok_or(EvalError::UnknownVariable(lexical))
            }
            Some(Token::LeftParen) => {
                let value = self.expression()?;
                if !self.eat(&Token::RightParen) {
                    return Err(EvalError::Syntax("expected ')'".to_string()));
                }
                Ok(value)
            }
            Some(Token::Name(name)) => {
                if self.eat(&Token::LeftParen) {
                    let mut args = Vec::new();
                    if !self.eat(&Token::RightParen) {
                        loop {
                            args.push(self.expression()?);
                            if self.eat(&Token::RightParen) {
                                break;
                            }
                            if !self.eat(&Token::Comma) {
                                return Err(EvalError::Syntax(
                                    "expected ',' or ')'".to_string(),
                                ));
                            }
                        }
                    }
                    let local = name.rsplit(':').next().unwrap_or(&name);
                    self.evaluator.call(local, args)
                } else {
                    // a bare name is a path step, outside the static subset
                    Err(EvalError::Unsupported(format!("path step '{}'", name)))
                }
            }
            other => Err(EvalError::Syntax(format!("unexpected token {:?}", other))),
        }
    }
}

fn compare(left: &Atomic, op: &str, right: &Atomic) -> bool {
    if left.is_numeric() || right.is_numeric() {
        let l = left.number_value();
        let r = right.number_value();
        match op {
            "=" => l == r,
            "!=" => l != r,
            "<" => l < r,
            "<=" => l <= r,
            ">" => l > r,
            _ => l >= r,
        }
    } else {
        let l = left.string_value();
        let r = right.string_value();
        match op {
            "=" => l == r,
            "!=" => l != r,
            "<" => l < r,
            "<=" => l <= r,
            ">" => l > r,
            _ => l >= r,
        }
    }
}

fn arithmetic(left: &Atomic, op: char, right: &Atomic) -> Atomic {
    if let (Atomic::Integer(l), Atomic::Integer(r)) = (left, right) {
        return Atomic::Integer(match op {
            '+' => l + r,
            '-' => l - r,
            _ => l * r,
        });
    }
    let l = left.number_value();
    let r = right.number_value();
    Atomic::Double(match op {
        '+' => l + r,
        '-' => l - r,
        _ => l * r,
    })
}

/// Parse a decimal out of an already-evaluated static value; used for
/// version checks on shadow attributes.
pub fn decimal_value(value: &Atomic) -> Option<Decimal> {
    match value {
        Atomic::Integer(i) => Some(Decimal::new(*i, 0)),
        Atomic::Double(d) => Decimal::from_f64_retain(*d),
        Atomic::String(s) => s.trim().parse().ok(),
        Atomic::Boolean(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::HashMapExt;

    fn evaluate(source: &str) -> Result<Atomic, EvalError> {
        let variables = HashMap::new();
        let mut namespaces = Namespaces::default();
        namespaces.declare("xsl", XSLT_NAMESPACE);
        namespaces.declare("xs", XS_NAMESPACE);
        let evaluator = StaticEvaluator::new(&variables, &namespaces, Some("file:///base.xsl"));
        evaluator.evaluate(source)
    }

    fn boolean(source: &str) -> bool {
        evaluate(source).unwrap().effective_boolean_value()
    }

    #[test]
    fn test_literals() {
        assert_eq!(evaluate("'a'").unwrap(), Atomic::String("a".to_string()));
        assert_eq!(evaluate("42").unwrap(), Atomic::Integer(42));
        assert_eq!(evaluate("4.2").unwrap(), Atomic::Double(4.2));
    }

    #[test]
    fn test_boolean_functions() {
        assert!(boolean("true()"));
        assert!(!boolean("false()"));
        assert!(boolean("not(false())"));
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        assert_eq!(evaluate("1 + 2 * 3").unwrap(), Atomic::Integer(7));
        assert!(boolean("2 > 1"));
        assert!(boolean("1 + 1 = 2"));
        assert!(boolean("'a' != 'b'"));
        assert!(boolean("10 idiv 3 = 3"));
    }

    #[test]
    fn test_logic() {
        assert!(boolean("true() and 1 = 1"));
        assert!(boolean("false() or 2 ge 2"));
    }

    #[test]
    fn test_system_property() {
        assert_eq!(
            evaluate("system-property('xsl:version')").unwrap(),
            Atomic::String("3.0".to_string())
        );
        // unknown properties are the empty string
        assert!(!boolean("system-property('xsl:no-such-thing')"));
    }

    #[test]
    fn test_availability_functions() {
        assert!(boolean("function-available('concat')"));
        assert!(!boolean("function-available('no-such-function')"));
        assert!(boolean("element-available('xsl:value-of')"));
        assert!(!boolean("element-available('xsl:no-such-element')"));
        assert!(boolean("type-available('xs:integer')"));
        assert!(!boolean("type-available('xs:no-such-type')"));
    }

    #[test]
    fn test_static_base_uri() {
        assert_eq!(
            evaluate("static-base-uri()").unwrap(),
            Atomic::String("file:///base.xsl".to_string())
        );
    }

    #[test]
    fn test_variables() {
        let mut variables = HashMap::new();
        variables.insert(Name::unprefixed("flag"), Atomic::Boolean(true));
        let namespaces = Namespaces::default();
        let evaluator = StaticEvaluator::new(&variables, &namespaces, None);
        assert!(evaluator.evaluate_boolean("$flag").unwrap());
        assert!(matches!(
            evaluator.evaluate("$missing"),
            Err(EvalError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_unsupported_is_not_syntax() {
        let error = evaluate("foo/bar").unwrap_err();
        assert!(!error.is_syntax());
        let error = evaluate("'unterminated").unwrap_err();
        assert!(error.is_syntax());
    }

    #[test]
    fn test_comments_are_skipped() {
        assert!(boolean("(: comment :) true()"));
    }
}
