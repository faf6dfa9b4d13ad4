use std::str::FromStr;

use ahash::{HashMap, HashMapExt};
use strum_macros::{Display, EnumString};

/// Every XSLT element form the compiler understands, dispatched on the
/// local name within the XSLT namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum XsltElement {
    Accept,
    Accumulator,
    AccumulatorRule,
    AnalyzeString,
    ApplyImports,
    ApplyTemplates,
    Assert,
    Attribute,
    AttributeSet,
    Break,
    CallTemplate,
    Catch,
    CharacterMap,
    Choose,
    Comment,
    ContextItem,
    Copy,
    CopyOf,
    DecimalFormat,
    Document,
    Element,
    Evaluate,
    Expose,
    Fallback,
    ForEach,
    ForEachGroup,
    Fork,
    Function,
    GlobalContextItem,
    If,
    Import,
    ImportSchema,
    Include,
    Iterate,
    Key,
    Map,
    MapEntry,
    MatchingSubstring,
    Merge,
    MergeAction,
    MergeKey,
    MergeSource,
    Message,
    Mode,
    Namespace,
    NamespaceAlias,
    NextIteration,
    NextMatch,
    NonMatchingSubstring,
    Number,
    OnCompletion,
    OnEmpty,
    OnNonEmpty,
    Otherwise,
    Output,
    OutputCharacter,
    Override,
    Package,
    Param,
    PerformSort,
    PreserveSpace,
    ProcessingInstruction,
    ResultDocument,
    Sequence,
    Sort,
    SourceDocument,
    StripSpace,
    Stylesheet,
    Template,
    Text,
    Transform,
    Try,
    UsePackage,
    ValueOf,
    Variable,
    When,
    WherePopulated,
    WithParam,
}

impl XsltElement {
    pub fn lookup(local: &str) -> Option<Self> {
        Self::from_str(local).ok()
    }

    /// Is this one of the root element forms?
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Stylesheet | Self::Transform | Self::Package)
    }

    /// May this element appear as a top-level declaration?
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            Self::Accumulator
                | Self::AttributeSet
                | Self::CharacterMap
                | Self::DecimalFormat
                | Self::Expose
                | Self::Function
                | Self::GlobalContextItem
                | Self::Import
                | Self::ImportSchema
                | Self::Include
                | Self::Key
                | Self::Mode
                | Self::NamespaceAlias
                | Self::Output
                | Self::Param
                | Self::PreserveSpace
                | Self::StripSpace
                | Self::Template
                | Self::UsePackage
                | Self::Variable
        )
    }

    /// Must this element have no content?
    pub fn must_be_empty(&self) -> bool {
        matches!(
            self,
            Self::ApplyImports
                | Self::CopyOf
                | Self::Import
                | Self::Include
                | Self::Mode
                | Self::NamespaceAlias
                | Self::NextIteration
                | Self::NextMatch
                | Self::Output
                | Self::OutputCharacter
                | Self::PreserveSpace
                | Self::StripSpace
        )
    }
}

/// The globally allowed attributes: standard attributes in no namespace
/// on XSLT elements, or in the XSLT namespace on literal result elements.
pub const STANDARD_ATTRIBUTES: &[&str] = &[
    "use-when",
    "expand-text",
    "xpath-default-namespace",
    "default-collation",
    "exclude-result-prefixes",
    "extension-element-prefixes",
    "default-mode",
    "default-validation",
    "version",
];

/// Standard attributes in the XML namespace.
pub const XML_ATTRIBUTES: &[&str] = &["space", "base", "lang", "id"];

pub(crate) const OUTPUT_PROPERTIES: &[&str] = &[
    "method",
    "allow-duplicate-names",
    "build-tree",
    "byte-order-mark",
    "cdata-section-elements",
    "doctype-public",
    "doctype-system",
    "encoding",
    "escape-uri-attributes",
    "html-version",
    "include-content-type",
    "indent",
    "item-separator",
    "json-node-output-method",
    "media-type",
    "normalization-form",
    "omit-xml-declaration",
    "parameter-document",
    "standalone",
    "suppress-indentation",
    "undeclare-prefixes",
    "use-character-maps",
    "version",
];

/// The attributes defined for each element, beyond the standard set.
fn defined_attributes(element: XsltElement) -> &'static [&'static str] {
    use XsltElement::*;
    match element {
        Accept | Expose => &["component", "names", "visibility"],
        Accumulator => &["name", "initial-value", "as", "streamable"],
        AccumulatorRule => &["match", "phase", "select"],
        AnalyzeString => &["select", "regex", "flags"],
        ApplyImports | NextIteration | NextMatch => &[],
        ApplyTemplates => &["select", "mode"],
        Assert => &["test", "select", "error-code"],
        Attribute => &["name", "namespace", "select", "separator", "type", "validation"],
        AttributeSet => &["name", "use-attribute-sets", "visibility", "streamable"],
        Break | Comment | ForEach | Iterate | OnCompletion | OnEmpty | OnNonEmpty
        | PerformSort | Sequence => &["select"],
        CallTemplate => &["name"],
        Catch => &["errors", "select"],
        CharacterMap => &["name", "use-character-maps"],
        Choose | Fallback | Fork | MatchingSubstring | Map | Merge | MergeAction
        | NonMatchingSubstring | Otherwise | Override | WherePopulated => &[],
        ContextItem | GlobalContextItem => &["as", "use"],
        Copy => &[
            "select",
            "copy-namespaces",
            "inherit-namespaces",
            "use-attribute-sets",
            "type",
            "validation",
        ],
        CopyOf => &["select", "copy-namespaces", "type", "validation"],
        DecimalFormat => &[
            "name",
            "decimal-separator",
            "grouping-separator",
            "infinity",
            "minus-sign",
            "NaN",
            "percent",
            "per-mille",
            "zero-digit",
            "digit",
            "pattern-separator",
            "exponent-separator",
        ],
        Document => &["validation", "type"],
        Element => &[
            "name",
            "namespace",
            "inherit-namespaces",
            "use-attribute-sets",
            "type",
            "validation",
        ],
        Evaluate => &[
            "xpath",
            "as",
            "base-uri",
            "with-params",
            "context-item",
            "namespace-context",
            "schema-aware",
        ],
        ForEachGroup => &[
            "select",
            "group-by",
            "group-adjacent",
            "group-starting-with",
            "group-ending-with",
            "composite",
            "collation",
        ],
        Function => &[
            "name",
            "as",
            "visibility",
            "streamability",
            "override-extension-function",
            "override",
            "new-each-time",
            "cache",
        ],
        If | When => &["test"],
        Import | Include => &["href"],
        ImportSchema => &["namespace", "schema-location"],
        Key => &["name", "match", "use", "composite", "collation"],
        MapEntry => &["key", "select"],
        MergeKey | Sort => &[
            "select",
            "lang",
            "order",
            "collation",
            "stable",
            "case-order",
            "data-type",
        ],
        MergeSource => &[
            "name",
            "for-each-item",
            "for-each-source",
            "select",
            "streamable",
            "use-accumulators",
            "sort-before-merge",
            "validation",
            "type",
        ],
        Message => &["select", "terminate", "error-code"],
        Mode => &[
            "name",
            "streamable",
            "use-accumulators",
            "on-no-match",
            "on-multiple-match",
            "warning-on-no-match",
            "warning-on-multiple-match",
            "typed",
            "visibility",
        ],
        Namespace => &["name", "select"],
        NamespaceAlias => &["stylesheet-prefix", "result-prefix"],
        Number => &[
            "value",
            "select",
            "level",
            "count",
            "from",
            "format",
            "lang",
            "letter-value",
            "ordinal",
            "start-at",
            "grouping-separator",
            "grouping-size",
        ],
        Output => &["name", "method", "use-character-maps", "version"],
        OutputCharacter => &["character", "string"],
        Package => &[
            "id",
            "name",
            "package-version",
            "input-type-annotations",
            "declared-modes",
        ],
        Param => &["name", "select", "as", "required", "static", "tunnel"],
        PreserveSpace | StripSpace => &["elements"],
        ProcessingInstruction => &["name", "select"],
        ResultDocument => &["format", "href", "validation", "type", "output-version"],
        SourceDocument => &["href", "streamable", "use-accumulators", "validation", "type"],
        Stylesheet | Transform => &["id", "input-type-annotations"],
        Template => &["match", "name", "priority", "mode", "as", "visibility"],
        Text => &["disable-output-escaping"],
        Try => &["select", "rollback-output"],
        UsePackage => &["name", "package-version"],
        ValueOf => &["select", "separator", "disable-output-escaping"],
        Variable => &["name", "select", "as", "static", "visibility"],
        WithParam => &["name", "select", "as", "tunnel"],
    }
}

/// The attribute-property table consulted for XTSE0090 validation.
/// Compilers run without one, which only disables that check.
#[derive(Debug, Clone)]
pub struct AttributeTable {
    entries: HashMap<String, Vec<String>>,
    standard: Vec<String>,
}

impl AttributeTable {
    /// The table covering the element forms this compiler implements.
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        for element in ALL_ELEMENTS {
            let mut allowed: Vec<String> = defined_attributes(*element)
                .iter()
                .map(|s| s.to_string())
                .collect();
            if matches!(element, XsltElement::Output | XsltElement::ResultDocument) {
                allowed.extend(OUTPUT_PROPERTIES.iter().map(|s| s.to_string()));
            }
            entries.insert(element.to_string(), allowed);
        }
        Self {
            entries,
            standard: STANDARD_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Build from a key-value listing; the `_standard` key holds the
    /// globally allowed attributes.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let mut map = HashMap::new();
        let mut standard = Vec::new();
        for (key, values) in entries {
            if key == "_standard" {
                standard = values;
            } else {
                map.insert(key, values);
            }
        }
        Self {
            entries: map,
            standard,
        }
    }

    pub fn is_allowed(&self, element: XsltElement, attribute: &str) -> bool {
        if self.standard.iter().any(|s| s == attribute) {
            return true;
        }
        match self.entries.get(&element.to_string()) {
            Some(allowed) => allowed.iter().any(|s| s == attribute),
            // an element missing from the table is left unchecked
            None => true,
        }
    }
}

const ALL_ELEMENTS: &[XsltElement] = &[
    XsltElement::Accept,
    XsltElement::Accumulator,
    XsltElement::AccumulatorRule,
    XsltElement::AnalyzeString,
    XsltElement::ApplyImports,
    XsltElement::ApplyTemplates,
    XsltElement::Assert,
    XsltElement::Attribute,
    XsltElement::AttributeSet,
    XsltElement::Break,
    XsltElement::CallTemplate,
    XsltElement::Catch,
    XsltElement::CharacterMap,
    XsltElement::Choose,
    XsltElement::Comment,
    XsltElement::ContextItem,
    XsltElement::Copy,
    XsltElement::CopyOf,
    XsltElement::DecimalFormat,
    XsltElement::Document,
    XsltElement::Element,
    XsltElement::Evaluate,
    XsltElement::Expose,
    XsltElement::Fallback,
    XsltElement::ForEach,
    XsltElement::ForEachGroup,
    XsltElement::Fork,
    XsltElement::Function,
    XsltElement::GlobalContextItem,
    XsltElement::If,
    XsltElement::Import,
    XsltElement::ImportSchema,
    XsltElement::Include,
    XsltElement::Iterate,
    XsltElement::Key,
    XsltElement::Map,
    XsltElement::MapEntry,
    XsltElement::MatchingSubstring,
    XsltElement::Merge,
    XsltElement::MergeAction,
    XsltElement::MergeKey,
    XsltElement::MergeSource,
    XsltElement::Message,
    XsltElement::Mode,
    XsltElement::Namespace,
    XsltElement::NamespaceAlias,
    XsltElement::NextIteration,
    XsltElement::NextMatch,
    XsltElement::NonMatchingSubstring,
    XsltElement::Number,
    XsltElement::OnCompletion,
    XsltElement::OnEmpty,
    XsltElement::OnNonEmpty,
    XsltElement::Otherwise,
    XsltElement::Output,
    XsltElement::OutputCharacter,
    XsltElement::Override,
    XsltElement::Package,
    XsltElement::Param,
    XsltElement::PerformSort,
    XsltElement::PreserveSpace,
    XsltElement::ProcessingInstruction,
    XsltElement::ResultDocument,
    XsltElement::Sequence,
    XsltElement::Sort,
    XsltElement::SourceDocument,
    XsltElement::StripSpace,
    XsltElement::Stylesheet,
    XsltElement::Template,
    XsltElement::Text,
    XsltElement::Transform,
    XsltElement::Try,
    XsltElement::UsePackage,
    XsltElement::ValueOf,
    XsltElement::Variable,
    XsltElement::When,
    XsltElement::WherePopulated,
    XsltElement::WithParam,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kebab_case_lookup() {
        assert_eq!(
            XsltElement::lookup("apply-templates"),
            Some(XsltElement::ApplyTemplates)
        );
        assert_eq!(XsltElement::lookup("value-of"), Some(XsltElement::ValueOf));
        assert_eq!(XsltElement::lookup("if"), Some(XsltElement::If));
        assert_eq!(XsltElement::lookup("brand-new"), None);
    }

    #[test]
    fn test_builtin_table() {
        let table = AttributeTable::builtin();
        assert!(table.is_allowed(XsltElement::Template, "match"));
        assert!(table.is_allowed(XsltElement::Template, "use-when"));
        assert!(!table.is_allowed(XsltElement::Template, "select"));
        assert!(table.is_allowed(XsltElement::Output, "indent"));
    }

    #[test]
    fn test_custom_table_standard_key() {
        let table = AttributeTable::from_entries(vec![
            ("_standard".to_string(), vec!["use-when".to_string()]),
            ("if".to_string(), vec!["test".to_string()]),
        ]);
        assert!(table.is_allowed(XsltElement::If, "test"));
        assert!(table.is_allowed(XsltElement::If, "use-when"));
        assert!(!table.is_allowed(XsltElement::If, "select"));
        // unlisted elements are not checked
        assert!(table.is_allowed(XsltElement::Choose, "anything"));
    }
}
