use rust_decimal::Decimal;

use xsltc_name::Name;

use crate::pattern::{NameTest, Pattern};
use crate::value_template::ValueTemplate;

/// Sequence types are kept in their lexical form; the type system belongs
/// to the external schema machinery.
pub type SequenceType = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Validation {
    Strict,
    Lax,
    Preserve,
    #[default]
    Strip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Final,
    Abstract,
    Hidden,
}

/// A mode reference on xsl:apply-templates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ModeRef {
    #[default]
    Default,
    Current,
    Unnamed,
    Named(Name),
}

/// One token of an xsl:template mode list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TemplateMode {
    All,
    Default,
    Unnamed,
    Named(Name),
}

/// The name under which template rules are grouped for dispatch. `All`
/// marks rules registered from a `mode="#all"` template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ModeName {
    #[default]
    Unnamed,
    All,
    Named(Name),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sort<E> {
    pub select: Option<E>,
    pub lang: Option<ValueTemplate<E>>,
    pub order: Option<ValueTemplate<E>>,
    pub collation: Option<ValueTemplate<E>>,
    pub stable: Option<ValueTemplate<E>>,
    pub case_order: Option<ValueTemplate<E>>,
    pub data_type: Option<ValueTemplate<E>>,
    pub content: Vec<Instruction<E>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct WithParam<E> {
    pub name: Name,
    pub select: Option<E>,
    pub as_: Option<SequenceType>,
    pub tunnel: bool,
    pub content: Vec<Instruction<E>>,
}

/// A declared parameter of a template, function, or xsl:iterate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Param<E> {
    pub name: Name,
    pub select: Option<E>,
    pub as_: Option<SequenceType>,
    pub required: bool,
    pub tunnel: bool,
    pub content: Vec<Instruction<E>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct When<E> {
    pub test: E,
    pub content: Vec<Instruction<E>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Catch<E> {
    /// Error name tests; empty means catch everything.
    pub errors: Vec<NameTest>,
    pub select: Option<E>,
    pub content: Vec<Instruction<E>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Grouping<E> {
    By(E),
    Adjacent(E),
    StartingWith(Pattern<E>),
    EndingWith(Pattern<E>),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MergeSource<E> {
    pub name: Option<String>,
    pub for_each_item: Option<E>,
    pub for_each_source: Option<E>,
    pub select: E,
    pub keys: Vec<Sort<E>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum NumberLevel {
    #[default]
    Single,
    Multiple,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AccumulatorPhase {
    Start,
    End,
}

/// One instruction of a sequence constructor.
///
/// Structural children (xsl:when, xsl:sort, xsl:with-param, …) appear here
/// too while a parent element is still open; the parent's compiler folds
/// them into its own record and they never survive into a finished body.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Instruction<E> {
    AnalyzeString {
        select: E,
        regex: ValueTemplate<E>,
        flags: Option<ValueTemplate<E>>,
        matching: Option<Vec<Instruction<E>>>,
        non_matching: Option<Vec<Instruction<E>>>,
    },
    ApplyImports {
        params: Vec<WithParam<E>>,
    },
    ApplyTemplates {
        select: Option<E>,
        mode: ModeRef,
        sorts: Vec<Sort<E>>,
        params: Vec<WithParam<E>>,
    },
    Assert {
        test: E,
        select: Option<E>,
        error_code: Option<ValueTemplate<E>>,
        content: Vec<Instruction<E>>,
    },
    Attribute {
        name: ValueTemplate<E>,
        namespace: Option<ValueTemplate<E>>,
        select: Option<E>,
        separator: Option<ValueTemplate<E>>,
        validation: Validation,
        type_: Option<Name>,
        content: Vec<Instruction<E>>,
    },
    Break {
        select: Option<E>,
        content: Vec<Instruction<E>>,
    },
    CallTemplate {
        name: Name,
        params: Vec<WithParam<E>>,
    },
    Choose {
        whens: Vec<When<E>>,
        otherwise: Option<Vec<Instruction<E>>>,
    },
    Comment {
        select: Option<E>,
        content: Vec<Instruction<E>>,
    },
    Copy {
        select: Option<E>,
        copy_namespaces: bool,
        inherit_namespaces: bool,
        use_attribute_sets: Vec<Name>,
        validation: Validation,
        content: Vec<Instruction<E>>,
    },
    CopyOf {
        select: E,
        copy_namespaces: bool,
        validation: Validation,
    },
    Document {
        validation: Validation,
        content: Vec<Instruction<E>>,
    },
    Element {
        name: ValueTemplate<E>,
        namespace: Option<ValueTemplate<E>>,
        inherit_namespaces: bool,
        use_attribute_sets: Vec<Name>,
        validation: Validation,
        type_: Option<Name>,
        content: Vec<Instruction<E>>,
    },
    Evaluate {
        xpath: E,
        as_: Option<SequenceType>,
        context_item: Option<E>,
        namespace_context: Option<E>,
        with_params: Vec<WithParam<E>>,
    },
    Fallback {
        content: Vec<Instruction<E>>,
    },
    ForEach {
        select: E,
        sorts: Vec<Sort<E>>,
        content: Vec<Instruction<E>>,
    },
    ForEachGroup {
        select: E,
        grouping: Grouping<E>,
        collation: Option<ValueTemplate<E>>,
        sorts: Vec<Sort<E>>,
        content: Vec<Instruction<E>>,
    },
    Fork {
        content: Vec<Instruction<E>>,
    },
    If {
        test: E,
        content: Vec<Instruction<E>>,
    },
    Iterate {
        select: E,
        params: Vec<Param<E>>,
        on_completion: Option<Vec<Instruction<E>>>,
        content: Vec<Instruction<E>>,
    },
    /// A literal result element, carried with its output namespaces.
    LiteralElement {
        name: Name,
        attributes: Vec<(Name, ValueTemplate<E>)>,
        /// prefix to URI pairs copied to the result
        namespaces: Vec<(String, String)>,
        use_attribute_sets: Vec<Name>,
        content: Vec<Instruction<E>>,
    },
    LiteralText {
        text: String,
    },
    Map {
        content: Vec<Instruction<E>>,
    },
    MapEntry {
        key: E,
        select: Option<E>,
        content: Vec<Instruction<E>>,
    },
    Merge {
        sources: Vec<MergeSource<E>>,
        action: Vec<Instruction<E>>,
    },
    Message {
        select: Option<E>,
        terminate: Option<ValueTemplate<E>>,
        error_code: Option<ValueTemplate<E>>,
        content: Vec<Instruction<E>>,
    },
    Namespace {
        name: ValueTemplate<E>,
        select: Option<E>,
        content: Vec<Instruction<E>>,
    },
    NextIteration {
        params: Vec<WithParam<E>>,
    },
    NextMatch {
        params: Vec<WithParam<E>>,
    },
    Number {
        value: Option<E>,
        select: Option<E>,
        level: NumberLevel,
        count: Option<Pattern<E>>,
        from: Option<Pattern<E>>,
        format: Option<ValueTemplate<E>>,
        lang: Option<ValueTemplate<E>>,
        grouping_separator: Option<ValueTemplate<E>>,
        grouping_size: Option<ValueTemplate<E>>,
    },
    OnEmpty {
        select: Option<E>,
        content: Vec<Instruction<E>>,
    },
    OnNonEmpty {
        select: Option<E>,
        content: Vec<Instruction<E>>,
    },
    PerformSort {
        select: Option<E>,
        sorts: Vec<Sort<E>>,
        content: Vec<Instruction<E>>,
    },
    ProcessingInstruction {
        name: ValueTemplate<E>,
        select: Option<E>,
        content: Vec<Instruction<E>>,
    },
    ResultDocument {
        href: Option<ValueTemplate<E>>,
        format: Option<ValueTemplate<E>>,
        validation: Validation,
        properties: Vec<(Name, ValueTemplate<E>)>,
        content: Vec<Instruction<E>>,
    },
    Sequence {
        select: Option<E>,
        content: Vec<Instruction<E>>,
    },
    SourceDocument {
        href: ValueTemplate<E>,
        streamable: bool,
        validation: Validation,
        content: Vec<Instruction<E>>,
    },
    Text {
        text: String,
    },
    /// Character data containing `{…}` fragments under expand-text.
    TextValueTemplate {
        template: ValueTemplate<E>,
    },
    Try {
        select: Option<E>,
        rollback_output: bool,
        content: Vec<Instruction<E>>,
        catches: Vec<Catch<E>>,
    },
    ValueOf {
        select: Option<E>,
        separator: Option<ValueTemplate<E>>,
        disable_output_escaping: bool,
        content: Vec<Instruction<E>>,
    },
    Variable {
        name: Name,
        select: Option<E>,
        as_: Option<SequenceType>,
        content: Vec<Instruction<E>>,
    },
    WherePopulated {
        content: Vec<Instruction<E>>,
    },

    // structural children, folded away by their parent's compiler
    WhenItem(When<E>),
    OtherwiseItem {
        content: Vec<Instruction<E>>,
    },
    SortItem(Sort<E>),
    WithParamItem(WithParam<E>),
    ParamItem(Param<E>),
    CatchItem(Catch<E>),
    MatchingSubstringItem {
        content: Vec<Instruction<E>>,
    },
    NonMatchingSubstringItem {
        content: Vec<Instruction<E>>,
    },
    OnCompletionItem {
        select: Option<E>,
        content: Vec<Instruction<E>>,
    },
    MergeSourceItem(MergeSource<E>),
    MergeKeyItem(Sort<E>),
    MergeActionItem {
        content: Vec<Instruction<E>>,
    },
    ContextItemDecl {
        as_: Option<SequenceType>,
        use_: ContextItemUse,
    },
    OutputCharacterItem {
        character: char,
        string: String,
    },
    AccumulatorRuleItem {
        match_: Pattern<E>,
        phase: AccumulatorPhase,
        select: Option<E>,
        content: Vec<Instruction<E>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ContextItemUse {
    #[default]
    Optional,
    Required,
    Absent,
}

impl<E> Instruction<E> {
    /// Is this a structural child that must be folded into its parent?
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Instruction::WhenItem(_)
                | Instruction::OtherwiseItem { .. }
                | Instruction::SortItem(_)
                | Instruction::WithParamItem(_)
                | Instruction::ParamItem(_)
                | Instruction::CatchItem(_)
                | Instruction::MatchingSubstringItem { .. }
                | Instruction::NonMatchingSubstringItem { .. }
                | Instruction::OnCompletionItem { .. }
                | Instruction::MergeSourceItem(_)
                | Instruction::MergeKeyItem(_)
                | Instruction::MergeActionItem { .. }
                | Instruction::ContextItemDecl { .. }
                | Instruction::OutputCharacterItem { .. }
                | Instruction::AccumulatorRuleItem { .. }
        )
    }

    /// Whitespace-insignificant literal text, dropped outside xsl:text.
    pub fn is_whitespace_text(&self) -> bool {
        match self {
            Instruction::LiteralText { text } => text.chars().all(char::is_whitespace),
            _ => false,
        }
    }
}

/// The decimal version literal `3.0`, the reference point for
/// forwards-compatible processing.
pub fn xslt_30() -> Decimal {
    Decimal::new(30, 1)
}
