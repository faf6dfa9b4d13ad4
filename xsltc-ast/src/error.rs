use strum::EnumMessage;
use strum_macros::{Display, EnumMessage};

pub type Result<T> = std::result::Result<T, Error>;

/// XSLT/XPath error code.
///
/// These are defined by the XSLT 3.0 and XPath specifications. The first
/// doc-comment paragraph of each variant is its message, the second an
/// explanatory note; both are reachable through `strum::EnumMessage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumMessage)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[allow(clippy::upper_case_acronyms)]
pub enum ErrorCode {
    /// Invalid stylesheet structure.
    ///
    /// An element occurs in a place where it is not permitted, lacks
    /// mandatory content, or carries content it must not have.
    XTSE0010,
    /// Invalid attribute value.
    ///
    /// The value of an attribute on an XSLT element is not valid for that
    /// attribute, and the stylesheet is not processed in
    /// forwards-compatible mode.
    XTSE0020,
    /// Reserved namespace.
    ///
    /// A user-defined component name must not be in a namespace reserved
    /// by the XSLT, XML or XML Schema specifications.
    XTSE0080,
    /// Unknown attribute.
    ///
    /// An element in the XSLT namespace has an attribute that is neither
    /// defined for it nor a standard attribute, and is in no namespace.
    XTSE0090,
    /// Invalid version.
    ///
    /// The value of the version attribute must be a decimal number.
    XTSE0110,
    /// Text at top level.
    ///
    /// An xsl:stylesheet element must not have text node children other
    /// than whitespace inside its own declarations.
    XTSE0120,
    /// Top-level element with no namespace.
    ///
    /// User-defined data elements directly within xsl:stylesheet must have
    /// a non-null namespace URI.
    XTSE0130,
    /// Wrong document element.
    ///
    /// The document element is named stylesheet, transform or package but
    /// is not in the XSLT namespace, or the stylesheet is otherwise not a
    /// valid stylesheet module.
    XTSE0150,
    /// Circular inclusion.
    ///
    /// A stylesheet module directly or indirectly includes itself.
    XTSE0180,
    /// Unresolvable or circular import.
    ///
    /// The resource referenced by xsl:import cannot be retrieved as a
    /// stylesheet module, or a module directly or indirectly imports
    /// itself.
    XTSE0210,
    /// Element must be empty.
    ///
    /// This XSLT element must have empty content.
    XTSE0260,
    /// Undeclared namespace prefix.
    ///
    /// A QName used in the stylesheet has a prefix with no in-scope
    /// namespace declaration.
    XTSE0280,
    /// Pattern not allowed in this version.
    ///
    /// The pattern uses constructs that are not available when the
    /// effective XSLT version is 2.0.
    XTSE0340,
    /// Value template syntax error.
    ///
    /// An unescaped left curly bracket has no matching right curly
    /// bracket, or a text value template contains an element constructor.
    XTSE0350,
    /// Template without match or name.
    ///
    /// An xsl:template element must have a match attribute or a name
    /// attribute, or both; priority and mode require match.
    XTSE0500,
    /// Invalid mode list.
    ///
    /// The mode list of a template is empty, contains duplicates, or
    /// combines #all with other values.
    XTSE0550,
    /// Duplicate global variable.
    ///
    /// Two global variables or parameters have the same expanded name and
    /// the same import precedence, with no overriding higher-precedence
    /// binding.
    XTSE0630,
    /// Duplicate named template.
    ///
    /// Two named templates have the same expanded name and the same
    /// import precedence.
    XTSE0660,
    /// Duplicate parameter name.
    ///
    /// Two parameters of a template or function, or two xsl:with-param
    /// children of an instruction, have the same expanded name.
    XTSE0670,
    /// Unknown attribute set.
    ///
    /// A use-attribute-sets attribute references an attribute set that is
    /// not declared anywhere in the stylesheet.
    XTSE0710,
    /// Undeclared prefix in exclusion list.
    ///
    /// A prefix listed in exclude-result-prefixes or
    /// extension-element-prefixes has no in-scope namespace declaration.
    XTSE0808,
    /// Conflicting xsl:number attributes.
    ///
    /// The value attribute of xsl:number is present together with level,
    /// count or from.
    XTSE0975,
    /// Invalid grouping attributes.
    ///
    /// xsl:for-each-group must have exactly one of group-by,
    /// group-adjacent, group-starting-with and group-ending-with.
    XTSE1080,
    /// Decimal format character clash.
    ///
    /// The picture characters of an xsl:decimal-format declaration must
    /// all be distinct single characters.
    XTSE1300,
    /// Conflicting declaration properties.
    ///
    /// Two declarations for the same mode, accumulator or decimal format
    /// specify conflicting properties at the same import precedence.
    XTSE1505,
    /// Duplicate character map.
    ///
    /// Two xsl:character-map declarations with the same name have the same
    /// import precedence.
    XTSE1580,
    /// Unknown character map.
    ///
    /// A use-character-maps attribute references a character map that is
    /// not declared anywhere in the stylesheet.
    XTSE1660,
    /// Unresolvable package.
    ///
    /// The package named by xsl:use-package cannot be located, or its
    /// name is not a valid absolute URI.
    XTSE3000,
    /// Abstract component not overridden.
    ///
    /// A package used with xsl:use-package exposes an abstract component
    /// for which the using package supplies no xsl:override.
    XTSE3010,
    /// Accept matches no component.
    ///
    /// An xsl:accept element matches no component exposed by the used
    /// package.
    XTSE3020,
    /// Invalid accepted visibility.
    ///
    /// The visibility assigned by xsl:accept is inconsistent with the
    /// visibility declared by the used package's component.
    XTSE3085,

    /// XPath syntax error.
    ///
    /// An expression or pattern is not a valid instance of the grammar.
    XPST0003,
    /// Unknown function or invalid pattern function.
    ///
    /// A function call does not match any known function signature, or a
    /// pattern starts with a function other than id, key, doc,
    /// element-with-id or root, or the arguments of such a function are
    /// not literals or variable references.
    XPST0017,

    /// Required parameter not supplied.
    ///
    /// A template or stylesheet parameter declared with required="yes" was
    /// not supplied at invocation time.
    XTDE0050,
    /// Unknown invocation mode.
    ///
    /// The mode named at invocation time does not match any mode used in
    /// the stylesheet.
    XTDE0555,
    /// Unknown initial template.
    ///
    /// The template named at invocation time does not exist.
    XTDE0560,
    /// Circular global variable.
    ///
    /// Global variable or parameter definitions are mutually dependent.
    XTDE0640,
    /// Invalid constructed name.
    ///
    /// The effective value of a name attribute evaluated at runtime is not
    /// a valid lexical QName or NCName.
    XTDE0980,

    /// Template result type mismatch.
    ///
    /// The result of a template body does not match the sequence type
    /// declared in its as attribute.
    XTTE0505,
    /// Variable value type mismatch.
    ///
    /// The supplied value of a variable does not match the sequence type
    /// declared in its as attribute.
    XTTE0570,
    /// Parameter value type mismatch.
    ///
    /// The converted value of a parameter does not match the sequence type
    /// declared in its as attribute.
    XTTE0590,
}

impl ErrorCode {
    pub fn code(&self) -> String {
        self.to_string()
    }

    pub fn message(&self) -> &str {
        self.documentation_pieces().0
    }

    pub fn note(&self) -> &str {
        self.documentation_pieces().1
    }

    fn documentation_pieces(&self) -> (&str, &str) {
        if let Some(documentation) = self.get_documentation() {
            let mut pieces = documentation.splitn(2, "\n\n");
            let first = pieces.next().unwrap_or("");
            let second = pieces.next().unwrap_or("");
            (first, second)
        } else {
            ("", "")
        }
    }

    /// Static errors abort compilation; the rest are recorded on the
    /// compiled tree and can only fire at transformation time.
    pub fn is_static(&self) -> bool {
        let name = self.to_string();
        name.starts_with("XTSE") || name.starts_with("XPST")
    }
}

/// A source position reported by the locator events: system id plus
/// one-based line and column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SourceLocation {
    pub system_id: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(system_id: Option<String>, line: u32, column: u32) -> Self {
        Self {
            system_id,
            line,
            column,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.system_id {
            Some(system_id) => write!(f, "{}:{}:{}", system_id, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// A compilation error: code, human-readable message and the source
/// location current when it was raised.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
        }
    }

    /// An error carrying only the code's own documentation message.
    pub fn code_only(code: ErrorCode) -> Self {
        Self::new(code, code.message())
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Attach a location only when none was recorded closer to the cause.
    pub fn at(mut self, location: &SourceLocation) -> Self {
        if self.location.is_none() {
            self.location = Some(location.clone());
        }
        self
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {}: {}", self.code, location, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_renders_as_name() {
        assert_eq!(ErrorCode::XTSE0080.code(), "XTSE0080");
    }

    #[test]
    fn test_message_is_first_doc_paragraph() {
        assert_eq!(ErrorCode::XTSE0080.message(), "Reserved namespace.");
        assert!(ErrorCode::XTSE0080.note().contains("reserved"));
    }

    #[test]
    fn test_static_classification() {
        assert!(ErrorCode::XTSE0010.is_static());
        assert!(ErrorCode::XPST0017.is_static());
        assert!(!ErrorCode::XTDE0640.is_static());
        assert!(!ErrorCode::XTTE0505.is_static());
    }

    #[test]
    fn test_display_with_location() {
        let error = Error::code_only(ErrorCode::XTSE0500)
            .with_location(SourceLocation::new(Some("a.xsl".to_string()), 3, 14));
        assert_eq!(
            error.to_string(),
            "XTSE0500 at a.xsl:3:14: Template without match or name."
        );
    }
}
