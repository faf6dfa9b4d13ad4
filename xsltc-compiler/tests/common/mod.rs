//! A minimal test-only event feeder: turns well-formed XML into the
//! parse events the compiler consumes. The production input contract is
//! an event stream pushed by the host's XML parser; this covers just
//! enough XML (elements, attributes, namespace declarations, character
//! data, the five predefined entities) to drive the tests.

use xsltc_ast::{Error, ErrorCode, Result};
use xsltc_compiler::{Compiler, ParseAttribute, XPathFacade};

pub fn feed<X: XPathFacade>(compiler: &mut Compiler<X>, xml: &str) -> Result<()> {
    let mut feeder = Feeder {
        xml,
        position: 0,
        line: 1,
        // element stack: qname plus the prefix bindings in scope
        stack: Vec::new(),
        scopes: vec![Scope::default()],
    };
    compiler.start_document()?;
    feeder.run(compiler)?;
    compiler.end_document()
}

pub fn compile(xml: &str) -> Result<xsltc_ast::stylesheet::Stylesheet<xsltc_compiler::SourceExpr>> {
    let facade = xsltc_compiler::SourceFacade;
    let mut compiler = Compiler::new(&facade);
    compiler.set_base_uri("file:///test.xsl");
    feed(&mut compiler, xml)?;
    compiler.into_stylesheet()
}

#[derive(Default, Clone)]
struct Scope {
    bindings: Vec<(String, String)>,
    default_ns: String,
}

impl Scope {
    fn resolve(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some("http://www.w3.org/XML/1998/namespace".to_string());
        }
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone())
    }
}

struct Feeder<'x> {
    xml: &'x str,
    position: usize,
    line: u32,
    stack: Vec<String>,
    scopes: Vec<Scope>,
}

impl Feeder<'_> {
    fn error(&self, message: &str) -> Error {
        Error::new(
            ErrorCode::XTSE0010,
            format!("test feeder: {} at line {}", message, self.line),
        )
    }

    fn rest(&self) -> &str {
        &self.xml[self.position..]
    }

    fn advance(&mut self, by: usize) {
        let consumed = &self.xml[self.position..self.position + by];
        self.line += consumed.matches('\n').count() as u32;
        self.position += by;
    }

    fn run<X: XPathFacade>(&mut self, compiler: &mut Compiler<X>) -> Result<()> {
        while self.position < self.xml.len() {
            compiler.set_locator(Some("file:///test.xsl"), self.line, 1);
            if self.rest().starts_with("<?") {
                let end = self
                    .rest()
                    .find("?>")
                    .ok_or_else(|| self.error("unterminated processing instruction"))?;
                self.advance(end + 2);
            } else if self.rest().starts_with("<!--") {
                let end = self
                    .rest()
                    .find("-->")
                    .ok_or_else(|| self.error("unterminated comment"))?;
                self.advance(end + 3);
            } else if self.rest().starts_with("</") {
                self.end_tag(compiler)?;
            } else if self.rest().starts_with('<') {
                self.start_tag(compiler)?;
            } else {
                self.text(compiler)?;
            }
        }
        if !self.stack.is_empty() {
            return Err(self.error("unclosed elements at end of input"));
        }
        Ok(())
    }

    fn text<X: XPathFacade>(&mut self, compiler: &mut Compiler<X>) -> Result<()> {
        let end = self.rest().find('<').unwrap_or(self.rest().len());
        let raw = &self.xml[self.position..self.position + end];
        let decoded = decode(raw);
        self.advance(end);
        compiler.characters(&decoded)
    }

    fn start_tag<X: XPathFacade>(&mut self, compiler: &mut Compiler<X>) -> Result<()> {
        let end = self
            .rest()
            .find('>')
            .ok_or_else(|| self.error("unterminated start tag"))?;
        let tag = &self.rest()[1..end];
        let (tag, self_closing) = match tag.strip_suffix('/') {
            Some(tag) => (tag.trim(), true),
            None => (tag.trim(), false),
        };
        let (qname, raw_attributes) = split_tag(tag).ok_or_else(|| self.error("empty tag"))?;
        let qname = qname.to_string();

        let mut scope = self
            .scopes
            .last()
            .expect("a scope is always open")
            .clone();
        let mut plain: Vec<(String, String)> = Vec::new();
        for (name, value) in raw_attributes {
            let value = decode(&value);
            if name == "xmlns" {
                scope.default_ns = value.clone();
                compiler.start_prefix_mapping("", &value);
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                scope.bindings.push((prefix.to_string(), value.clone()));
                compiler.start_prefix_mapping(prefix, &value);
            } else {
                plain.push((name, value));
            }
        }

        let (uri, local) = self.resolve_element(&scope, &qname)?;
        let mut attributes = Vec::new();
        for (name, value) in plain {
            let attribute_uri = match name.split_once(':') {
                Some((prefix, _)) => scope
                    .resolve(prefix)
                    .ok_or_else(|| self.error("undeclared attribute prefix"))?,
                // unprefixed attributes are in no namespace
                None => String::new(),
            };
            attributes.push(ParseAttribute::new(&attribute_uri, &name, &value));
        }

        compiler.start_element(&uri, &local, &qname, &attributes)?;
        if self_closing {
            compiler.end_element(&uri, &local, &qname)?;
        } else {
            self.stack.push(qname);
            self.scopes.push(scope);
        }
        self.advance(end + 1);
        Ok(())
    }

    fn end_tag<X: XPathFacade>(&mut self, compiler: &mut Compiler<X>) -> Result<()> {
        let end = self
            .rest()
            .find('>')
            .ok_or_else(|| self.error("unterminated end tag"))?;
        let qname = self.rest()[2..end].trim().to_string();
        let open = self
            .stack
            .pop()
            .ok_or_else(|| self.error("end tag without start tag"))?;
        if open != qname {
            return Err(self.error("mismatched end tag"));
        }
        let scope = self.scopes.pop().expect("scope pushed with the element");
        let (uri, local) = self.resolve_element(&scope, &qname)?;
        compiler.end_element(&uri, &local, &qname)?;
        self.advance(end + 1);
        Ok(())
    }

    fn resolve_element(&self, scope: &Scope, qname: &str) -> Result<(String, String)> {
        match qname.split_once(':') {
            Some((prefix, local)) => {
                let uri = scope
                    .resolve(prefix)
                    .ok_or_else(|| self.error("undeclared element prefix"))?;
                Ok((uri, local.to_string()))
            }
            None => Ok((scope.default_ns.clone(), qname.to_string())),
        }
    }
}

/// Split a start tag's interior into the element name and its
/// name="value" attributes.
fn split_tag(tag: &str) -> Option<(&str, Vec<(String, String)>)> {
    let name_end = tag
        .find(|c: char| c.is_whitespace())
        .unwrap_or(tag.len());
    let name = &tag[..name_end];
    if name.is_empty() {
        return None;
    }
    let mut attributes = Vec::new();
    let mut rest = tag[name_end..].trim_start();
    while !rest.is_empty() {
        let eq = rest.find('=')?;
        let attr_name = rest[..eq].trim().to_string();
        rest = rest[eq + 1..].trim_start();
        let quote = rest.chars().next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let close = rest[1..].find(quote)? + 1;
        attributes.push((attr_name, rest[1..close].to_string()));
        rest = rest[close + 1..].trim_start();
    }
    Some((name, attributes))
}

fn decode(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
