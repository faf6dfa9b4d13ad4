use thiserror::Error;

/// Byte offsets into the attribute value or text node this template was
/// scanned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A raw scanned fragment: literal text (curly escapes already folded) or
/// the text of an embedded expression, not yet compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RawFragment {
    Literal(String),
    Expr { source: String, span: Span },
}

/// A compiled value template: literal fragments interleaved with compiled
/// expressions. Evaluation concatenates the stringified results.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ValueTemplate<E> {
    pub fragments: Vec<Fragment<E>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Fragment<E> {
    Literal(String),
    Expr(E),
}

impl<E> ValueTemplate<E> {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![Fragment::Literal(text.into())],
        }
    }

    /// The constant value, when no expression fragment is present.
    pub fn as_literal(&self) -> Option<String> {
        let mut out = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Literal(text) => out.push_str(text),
                Fragment::Expr(_) => return None,
            }
        }
        Some(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// An unescaped `{` whose expression never terminates.
    #[error("unmatched '{{' at offset {0}")]
    UnmatchedOpen(usize),
    /// A `}` outside any expression that is not doubled.
    #[error("'}}' without matching '{{' at offset {0}")]
    UnmatchedClose(usize),
    /// `<` opening an element constructor inside a text value template.
    #[error("element constructor inside text value template at offset {0}")]
    ElementConstructor(usize),
}

/// Parse an attribute value template into raw fragments. `{{` and `}}`
/// denote literal braces; `{expr}` delimits an expression whose end is the
/// matching `}` ignoring braces inside string literals and XPath comments.
pub fn parse_value_template(s: &str) -> Result<Vec<RawFragment>, TemplateError> {
    Scanner::new(s, false).scan()
}

/// Parse character data as a text value template. Same scanning rules,
/// plus the prohibition of element constructors inside expressions.
pub fn parse_text_template(s: &str) -> Result<Vec<RawFragment>, TemplateError> {
    Scanner::new(s, true).scan()
}

struct Scanner<'a> {
    s: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    text_template: bool,
    literal: String,
    fragments: Vec<RawFragment>,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str, text_template: bool) -> Self {
        Self {
            s,
            chars: s.char_indices().peekable(),
            text_template,
            literal: String::new(),
            fragments: Vec::new(),
        }
    }

    fn scan(mut self) -> Result<Vec<RawFragment>, TemplateError> {
        while let Some((i, c)) = self.chars.next() {
            match c {
                '{' => {
                    if self.eat('{') {
                        self.literal.push('{');
                    } else {
                        self.flush_literal();
                        self.expression(i)?;
                    }
                }
                '}' => {
                    if self.eat('}') {
                        self.literal.push('}');
                    } else {
                        return Err(TemplateError::UnmatchedClose(i));
                    }
                }
                _ => self.literal.push(c),
            }
        }
        self.flush_literal();
        Ok(self.fragments)
    }

    /// Consume up to the `}` matching the `{` at `open`. Braces inside
    /// string literals and `(: :)` comments do not count; nested braces
    /// increment depth.
    fn expression(&mut self, open: usize) -> Result<(), TemplateError> {
        let start = open + 1;
        let mut depth = 0usize;
        let mut first = true;
        while let Some((i, c)) = self.chars.next() {
            if first {
                first = false;
                if self.text_template && c == '<' {
                    return Err(TemplateError::ElementConstructor(i));
                }
            }
            match c {
                '\'' | '"' => self.string_literal(c, open)?,
                '(' => {
                    if self.eat(':') {
                        self.comment(open)?;
                    }
                }
                '{' => depth += 1,
                '}' => {
                    if depth == 0 {
                        self.fragments.push(RawFragment::Expr {
                            source: self.s[start..i].to_string(),
                            span: Span::new(start, i),
                        });
                        return Ok(());
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        Err(TemplateError::UnmatchedOpen(open))
    }

    fn string_literal(&mut self, quote: char, open: usize) -> Result<(), TemplateError> {
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => {
                    // a doubled quote stays inside the literal
                    if !self.eat(quote) {
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => return Err(TemplateError::UnmatchedOpen(open)),
            }
        }
    }

    fn comment(&mut self, open: usize) -> Result<(), TemplateError> {
        let mut depth = 1usize;
        while let Some((_, c)) = self.chars.next() {
            match c {
                '(' if self.eat(':') => depth += 1,
                ':' if self.eat(')') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(TemplateError::UnmatchedOpen(open))
    }

    fn eat(&mut self, expected: char) -> bool {
        if let Some((_, c)) = self.chars.peek() {
            if *c == expected {
                self.chars.next();
                return true;
            }
        }
        false
    }

    fn flush_literal(&mut self) {
        if !self.literal.is_empty() {
            let text = std::mem::take(&mut self.literal);
            self.fragments.push(RawFragment::Literal(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(s: &str) -> RawFragment {
        RawFragment::Literal(s.to_string())
    }

    fn expr(s: &str, start: usize) -> RawFragment {
        RawFragment::Expr {
            source: s.to_string(),
            span: Span::new(start, start + s.len()),
        }
    }

    #[test]
    fn test_plain_string() {
        assert_eq!(
            parse_value_template("hello world").unwrap(),
            vec![literal("hello world")]
        );
    }

    #[test]
    fn test_escaped_curlies() {
        assert_eq!(parse_value_template("{{").unwrap(), vec![literal("{")]);
        assert_eq!(parse_value_template("}}").unwrap(), vec![literal("}")]);
        assert_eq!(
            parse_value_template("a{{b}}c").unwrap(),
            vec![literal("a{b}c")]
        );
    }

    #[test]
    fn test_literal_expr_literal() {
        assert_eq!(
            parse_value_template("a{b}c").unwrap(),
            vec![literal("a"), expr("b", 2), literal("c")]
        );
    }

    #[test]
    fn test_adjacent_expressions() {
        assert_eq!(
            parse_value_template("{a}{b}").unwrap(),
            vec![expr("a", 1), expr("b", 5)]
        );
    }

    #[test]
    fn test_braces_in_string_literal_do_not_count() {
        assert_eq!(
            parse_value_template("{'}'}").unwrap(),
            vec![expr("'}'", 1)]
        );
        assert_eq!(
            parse_value_template(r#"{"{"}"#).unwrap(),
            vec![expr(r#""{""#, 1)]
        );
    }

    #[test]
    fn test_doubled_quote_escape_in_string() {
        assert_eq!(
            parse_value_template("{'it''s'}").unwrap(),
            vec![expr("'it''s'", 1)]
        );
    }

    #[test]
    fn test_braces_in_comment_do_not_count() {
        assert_eq!(
            parse_value_template("{(: } :) 1}").unwrap(),
            vec![expr("(: } :) 1", 1)]
        );
    }

    #[test]
    fn test_nested_braces() {
        assert_eq!(
            parse_value_template("{map{'a': 1}}").unwrap(),
            vec![expr("map{'a': 1}", 1)]
        );
    }

    #[test]
    fn test_unmatched_open() {
        assert_eq!(
            parse_value_template("a{b"),
            Err(TemplateError::UnmatchedOpen(1))
        );
    }

    #[test]
    fn test_bare_close() {
        assert_eq!(
            parse_value_template("a}b"),
            Err(TemplateError::UnmatchedClose(1))
        );
    }

    #[test]
    fn test_text_template_rejects_element_constructor() {
        assert_eq!(
            parse_text_template("x{<a/>}"),
            Err(TemplateError::ElementConstructor(2))
        );
    }

    #[test]
    fn test_as_literal() {
        let template: ValueTemplate<()> = ValueTemplate {
            fragments: vec![
                Fragment::Literal("a".to_string()),
                Fragment::Literal("b".to_string()),
            ],
        };
        assert_eq!(template.as_literal(), Some("ab".to_string()));
    }
}
