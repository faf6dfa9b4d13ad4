use iri_string::types::{IriAbsoluteString, IriReferenceStr};
use rust_decimal::Decimal;

use xsltc_ast::instruction::{Instruction, ModeName, Validation};
use xsltc_ast::SourceLocation;
use xsltc_name::{Name, Namespaces};

use crate::event::ParseAttribute;
use crate::names::XsltElement;
use crate::xpath::StaticContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContextKind {
    /// xsl:stylesheet, xsl:transform or xsl:package as document element.
    Root(XsltElement),
    Xslt(XsltElement),
    /// An element in the XSLT namespace this compiler does not know,
    /// tolerated under forwards-compatible processing.
    UnknownXslt,
    /// A literal result element.
    Literal,
}

/// The compile-time stack frame for one open element. Created at
/// start-element, filled while children accumulate, consumed by the
/// element's compiler at end-element.
#[derive(Debug)]
pub(crate) struct ElementContext<E> {
    pub kind: ContextKind,
    pub name: Name,
    /// All in-scope bindings: the parent's copy extended with the
    /// mappings declared on this element.
    pub bindings: Namespaces,
    pub attributes: Vec<ParseAttribute>,
    /// URIs this element added to the exclusion set, removed at pop.
    pub excluded_here: Vec<String>,
    pub extension_here: Vec<String>,
    pub base_uri: Option<String>,
    pub expand_text: bool,
    pub version: Decimal,
    pub xpath_default_namespace: String,
    pub default_collation: Option<String>,
    pub default_mode: ModeName,
    pub default_validation: Validation,
    pub xml_space_preserve: bool,
    pub location: SourceLocation,
    pub children: Vec<Instruction<E>>,
    pub text: String,
}

impl<E> ElementContext<E> {
    /// The static context expressions and patterns on this element are
    /// compiled against.
    pub fn static_context(&self) -> StaticContext {
        StaticContext {
            namespaces: self.bindings.clone(),
            default_element_namespace: self.xpath_default_namespace.clone(),
            base_uri: self.base_uri.clone(),
            variable_names: Vec::new(),
        }
    }

    pub fn is_xslt(&self) -> bool {
        matches!(self.kind, ContextKind::Root(_) | ContextKind::Xslt(_))
            || self.kind == ContextKind::UnknownXslt
    }

    /// Look up an attribute the way XSLT defines it: in no namespace on
    /// XSLT elements, in the XSLT namespace on literal result elements.
    /// Shadow attributes were already folded in by the builder.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        let want_xslt_ns = !self.is_xslt();
        self.attributes
            .iter()
            .find(|a| {
                a.local == local
                    && if want_xslt_ns {
                        a.uri == xsltc_name::XSLT_NAMESPACE
                    } else {
                        a.uri.is_empty()
                    }
            })
            .map(|a| a.value.as_str())
    }

}

/// Resolve a URI reference against a base; an unresolvable or already
/// absolute reference is taken as-is.
pub(crate) fn resolve_uri(base: Option<&str>, reference: &str) -> String {
    let Ok(reference) = IriReferenceStr::new(reference) else {
        return reference.to_string();
    };
    match reference.to_iri() {
        Ok(iri) => iri.to_string(),
        Err(relative) => {
            if let Some(base) = base {
                if let Ok(base) = IriAbsoluteString::try_from(base.to_string()) {
                    return relative.resolve_against(&base).to_string();
                }
            }
            relative.to_string()
        }
    }
}
