use rust_decimal::Decimal;

use xsltc_ast::instruction::{TemplateMode, Validation, Visibility};
use xsltc_ast::pattern::Pattern;
use xsltc_ast::value_template::{parse_text_template, parse_value_template, Fragment, RawFragment, ValueTemplate};
use xsltc_ast::{Error, ErrorCode, Result};
use xsltc_name::{Name, XSLT_NAMESPACE};

use crate::context::ElementContext;
use crate::pattern_parser::PatternParser;
use crate::xpath::{StaticContext, XPathFacade};

/// Typed access to one element's attributes, bound to the static context
/// expressions on that element compile against.
pub(crate) struct Attributes<'a, X: XPathFacade> {
    pub ctx: &'a ElementContext<X::Expr>,
    pub facade: &'a X,
    pub static_ctx: StaticContext,
}

impl<'a, X: XPathFacade> Attributes<'a, X> {
    pub fn new(ctx: &'a ElementContext<X::Expr>, facade: &'a X) -> Self {
        let static_ctx = ctx.static_context();
        Self {
            ctx,
            facade,
            static_ctx,
        }
    }

    pub fn optional<T>(
        &self,
        name: &str,
        parse: impl FnOnce(&str) -> Result<T>,
    ) -> Result<Option<T>> {
        match self.ctx.attribute(name) {
            Some(value) => Ok(Some(parse(value)?)),
            None => Ok(None),
        }
    }

    pub fn required<T>(&self, name: &str, parse: impl FnOnce(&str) -> Result<T>) -> Result<T> {
        match self.ctx.attribute(name) {
            Some(value) => parse(value),
            None => Err(Error::new(
                ErrorCode::XTSE0010,
                format!(
                    "xsl:{} requires a {} attribute",
                    self.ctx.name.local(),
                    name
                ),
            )),
        }
    }

    pub fn string(&self, name: &str) -> Option<String> {
        self.ctx.attribute(name).map(|s| s.to_string())
    }

    pub fn string_required(&self, name: &str) -> Result<String> {
        self.required(name, |s| Ok(s.to_string()))
    }

    pub fn boolean_opt(&self, name: &str) -> Result<Option<bool>> {
        self.optional(name, |s| parse_boolean(name, s))
    }

    pub fn boolean(&self, name: &str, default: bool) -> Result<bool> {
        Ok(self.boolean_opt(name)?.unwrap_or(default))
    }

    pub fn char_default(&self, name: &str, default: char) -> Result<char> {
        Ok(self
            .optional(name, |s| {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(Error::new(
                        ErrorCode::XTSE0020,
                        format!("{} must be a single character, got '{}'", name, s),
                    )),
                }
            })?
            .unwrap_or(default))
    }

    pub fn eqname(&self, name: &str) -> Result<Option<Name>> {
        self.optional(name, |s| self.parse_eqname(s))
    }

    pub fn eqname_required(&self, name: &str) -> Result<Name> {
        self.required(name, |s| self.parse_eqname(s))
    }

    fn parse_eqname(&self, s: &str) -> Result<Name> {
        Name::parse_eqname(s.trim(), &self.ctx.bindings).ok_or_else(|| {
            Error::new(
                ErrorCode::XTSE0280,
                format!("undeclared namespace prefix in '{}'", s),
            )
        })
    }

    /// The name of a user-defined component; reserved namespaces are
    /// rejected, with xsl:initial-template as the 3.0 exception.
    pub fn component_name(&self, attribute: &str) -> Result<Name> {
        let name = self.eqname_required(attribute)?;
        self.check_not_reserved(&name)?;
        Ok(name)
    }

    pub fn check_not_reserved(&self, name: &Name) -> Result<()> {
        if name.in_reserved_namespace() {
            let initial_template = name.namespace() == Some(XSLT_NAMESPACE)
                && name.local() == "initial-template"
                && self.ctx.version >= Decimal::new(30, 1);
            if !initial_template {
                return Err(Error::new(
                    ErrorCode::XTSE0080,
                    format!("'{}' is in a reserved namespace", name.to_clark()),
                ));
            }
        }
        Ok(())
    }

    /// A whitespace-separated list of EQNames.
    pub fn name_list(&self, attribute: &str) -> Result<Vec<Name>> {
        match self.ctx.attribute(attribute) {
            Some(value) => value
                .split_whitespace()
                .map(|token| self.parse_eqname(token))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    /// The mode list of xsl:template: tokens, #default, #all, #unnamed.
    pub fn mode_list(&self, attribute: &str) -> Result<Vec<TemplateMode>> {
        let Some(value) = self.ctx.attribute(attribute) else {
            return Ok(Vec::new());
        };
        let tokens: Vec<&str> = value.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(Error::new(
                ErrorCode::XTSE0550,
                "the mode list must not be empty",
            ));
        }
        let mut modes = Vec::new();
        for token in &tokens {
            let mode = match *token {
                "#all" => {
                    if tokens.len() > 1 {
                        return Err(Error::new(
                            ErrorCode::XTSE0550,
                            "#all cannot be combined with other modes",
                        ));
                    }
                    TemplateMode::All
                }
                "#default" => TemplateMode::Default,
                "#unnamed" => TemplateMode::Unnamed,
                name => TemplateMode::Named(self.parse_eqname(name)?),
            };
            if modes.contains(&mode) {
                return Err(Error::new(
                    ErrorCode::XTSE0550,
                    format!("duplicate mode token '{}'", token),
                ));
            }
            modes.push(mode);
        }
        Ok(modes)
    }

    pub fn xpath(&self, attribute: &str) -> Result<Option<X::Expr>> {
        self.optional(attribute, |s| self.facade.compile(s, &self.static_ctx))
    }

    pub fn xpath_required(&self, attribute: &str) -> Result<X::Expr> {
        self.required(attribute, |s| self.facade.compile(s, &self.static_ctx))
    }

    pub fn avt(&self, attribute: &str) -> Result<Option<ValueTemplate<X::Expr>>> {
        self.optional(attribute, |s| {
            compile_value_template(self.facade, &self.static_ctx, s)
        })
    }

    pub fn avt_required(&self, attribute: &str) -> Result<ValueTemplate<X::Expr>> {
        self.required(attribute, |s| {
            compile_value_template(self.facade, &self.static_ctx, s)
        })
    }

    pub fn pattern(&self, attribute: &str) -> Result<Option<Pattern<X::Expr>>> {
        self.optional(attribute, |s| {
            PatternParser::new(self.facade, &self.static_ctx, self.ctx.version).parse(s)
        })
    }

    pub fn pattern_required(&self, attribute: &str) -> Result<Pattern<X::Expr>> {
        self.required(attribute, |s| {
            PatternParser::new(self.facade, &self.static_ctx, self.ctx.version).parse(s)
        })
    }

    pub fn visibility(&self, attribute: &str) -> Result<Visibility> {
        Ok(self
            .optional(attribute, |s| match s {
                "public" => Ok(Visibility::Public),
                "private" => Ok(Visibility::Private),
                "final" => Ok(Visibility::Final),
                "abstract" => Ok(Visibility::Abstract),
                "hidden" => Ok(Visibility::Hidden),
                other => Err(Error::new(
                    ErrorCode::XTSE0020,
                    format!("invalid visibility '{}'", other),
                )),
            })?
            .unwrap_or_default())
    }

    pub fn validation(&self, attribute: &str) -> Result<Validation> {
        Ok(self
            .optional(attribute, |s| parse_validation(s))?
            .unwrap_or(self.ctx.default_validation))
    }

    /// XTSE0260: this element must have no content.
    pub fn require_empty(&self) -> Result<()> {
        let significant = self
            .ctx
            .children
            .iter()
            .any(|child| !child.is_whitespace_text());
        if significant || !self.ctx.text.trim().is_empty() {
            return Err(Error::new(
                ErrorCode::XTSE0260,
                format!("xsl:{} must be empty", self.ctx.name.local()),
            ));
        }
        Ok(())
    }
}

pub(crate) fn parse_boolean(name: &str, s: &str) -> Result<bool> {
    match s.trim() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        other => Err(Error::new(
            ErrorCode::XTSE0020,
            format!("{} must be yes/no, got '{}'", name, other),
        )),
    }
}

pub(crate) fn parse_validation(s: &str) -> Result<Validation> {
    match s {
        "strict" => Ok(Validation::Strict),
        "lax" => Ok(Validation::Lax),
        "preserve" => Ok(Validation::Preserve),
        "strip" => Ok(Validation::Strip),
        other => Err(Error::new(
            ErrorCode::XTSE0020,
            format!("invalid validation '{}'", other),
        )),
    }
}

/// Compile an attribute value template: scan, then compile each embedded
/// expression against the carrying element's static context.
pub(crate) fn compile_value_template<X: XPathFacade>(
    facade: &X,
    ctx: &StaticContext,
    raw: &str,
) -> Result<ValueTemplate<X::Expr>> {
    let fragments = parse_value_template(raw)
        .map_err(|e| Error::new(ErrorCode::XTSE0350, e.to_string()))?;
    compile_fragments(facade, ctx, fragments)
}

/// Compile character data as a text value template.
pub(crate) fn compile_text_template<X: XPathFacade>(
    facade: &X,
    ctx: &StaticContext,
    raw: &str,
) -> Result<ValueTemplate<X::Expr>> {
    let fragments =
        parse_text_template(raw).map_err(|e| Error::new(ErrorCode::XTSE0350, e.to_string()))?;
    compile_fragments(facade, ctx, fragments)
}

fn compile_fragments<X: XPathFacade>(
    facade: &X,
    ctx: &StaticContext,
    fragments: Vec<RawFragment>,
) -> Result<ValueTemplate<X::Expr>> {
    let mut compiled = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        compiled.push(match fragment {
            RawFragment::Literal(text) => Fragment::Literal(text),
            RawFragment::Expr { source, .. } => Fragment::Expr(facade.compile(&source, ctx)?),
        });
    }
    Ok(ValueTemplate {
        fragments: compiled,
    })
}

/// Resolve a prefix from an exclusion list; `#default` names the default
/// namespace, `#all` is handled by the caller.
pub(crate) fn resolve_exclusion_prefix(
    bindings: &xsltc_name::Namespaces,
    prefix: &str,
) -> Result<String> {
    if prefix == "#default" {
        Ok(bindings.default_element_namespace().to_string())
    } else {
        bindings
            .by_prefix(prefix)
            .map(|uri| uri.to_string())
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::XTSE0808,
                    format!("prefix '{}' has no namespace declaration", prefix),
                )
            })
    }
}
