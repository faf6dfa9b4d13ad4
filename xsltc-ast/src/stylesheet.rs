use ahash::HashMap;
use rust_decimal::Decimal;

use xsltc_name::{Name, Namespaces};

use crate::instruction::{
    AccumulatorPhase, Instruction, ModeName, Param, SequenceType, TemplateMode, Validation,
    Visibility,
};
use crate::pattern::{NameTest, Pattern};

pub type TemplateId = usize;

/// A template body with its declared interface. Match-pattern rules
/// reference these by id so one body can serve several rule entries.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Template<E> {
    pub name: Option<Name>,
    pub modes: Vec<TemplateMode>,
    pub params: Vec<Param<E>>,
    pub as_: Option<SequenceType>,
    pub visibility: Visibility,
    pub precedence: u32,
    pub body: Vec<Instruction<E>>,
}

/// One entry of the match table. Rules are ordered by import precedence,
/// then priority, then declaration index.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TemplateRule<E> {
    pub pattern: Pattern<E>,
    pub mode: ModeName,
    pub priority: f64,
    pub precedence: u32,
    pub decl_index: u32,
    pub template: TemplateId,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GlobalVariable<E> {
    pub name: Name,
    pub is_param: bool,
    pub required: bool,
    pub static_: bool,
    pub select: Option<E>,
    pub as_: Option<SequenceType>,
    pub visibility: Visibility,
    pub content: Vec<Instruction<E>>,
    pub precedence: u32,
    /// Names of the global variables the initializer references, used for
    /// the seal-time ordering and circularity check.
    pub references: Vec<Name>,
    /// The compile-time value of a static variable or parameter, as a
    /// string.
    pub static_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Function<E> {
    pub name: Name,
    pub params: Vec<Param<E>>,
    pub as_: Option<SequenceType>,
    pub visibility: Visibility,
    pub override_extension_function: bool,
    pub cache: bool,
    pub precedence: u32,
    pub body: Vec<Instruction<E>>,
}

impl<E> Function<E> {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Key<E> {
    pub name: Name,
    pub match_: Pattern<E>,
    pub use_: Option<E>,
    pub content: Vec<Instruction<E>>,
    pub collation: Option<String>,
    pub composite: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AttributeSet<E> {
    pub name: Name,
    pub use_attribute_sets: Vec<Name>,
    pub visibility: Visibility,
    pub precedence: u32,
    /// Instruction::Attribute entries only.
    pub attributes: Vec<Instruction<E>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CharacterMap {
    pub name: Name,
    pub use_character_maps: Vec<Name>,
    pub characters: Vec<(char, String)>,
    pub precedence: u32,
}

/// The picture characters must be mutually distinct; the builder enforces
/// that before registration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecimalFormat {
    pub name: Option<Name>,
    pub precedence: u32,
    pub decimal_separator: char,
    pub grouping_separator: char,
    pub infinity: String,
    pub minus_sign: char,
    pub nan: String,
    pub percent: char,
    pub per_mille: char,
    pub zero_digit: char,
    pub digit: char,
    pub pattern_separator: char,
    pub exponent_separator: char,
}

impl Default for DecimalFormat {
    fn default() -> Self {
        Self {
            name: None,
            precedence: 0,
            decimal_separator: '.',
            grouping_separator: ',',
            infinity: "Infinity".to_string(),
            minus_sign: '-',
            nan: "NaN".to_string(),
            percent: '%',
            per_mille: '\u{2030}',
            zero_digit: '0',
            digit: '#',
            pattern_separator: ';',
            exponent_separator: 'e',
        }
    }
}

impl DecimalFormat {
    pub fn picture_characters(&self) -> [char; 7] {
        [
            self.decimal_separator,
            self.grouping_separator,
            self.percent,
            self.per_mille,
            self.zero_digit,
            self.digit,
            self.pattern_separator,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum OnNoMatch {
    #[default]
    TextOnlyCopy,
    ShallowCopy,
    ShallowCopyAll,
    DeepCopy,
    DeepSkip,
    ShallowSkip,
    Fail,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModeDecl {
    pub name: ModeName,
    pub on_no_match: OnNoMatch,
    pub streamable: bool,
    pub warning_on_no_match: bool,
    pub use_accumulators: Vec<Name>,
    pub precedence: u32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Accumulator<E> {
    pub name: Name,
    pub initial_value: E,
    pub as_: Option<SequenceType>,
    pub streamable: bool,
    pub precedence: u32,
    pub rules: Vec<AccumulatorRule<E>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AccumulatorRule<E> {
    pub match_: Pattern<E>,
    pub phase: AccumulatorPhase,
    pub select: Option<E>,
    pub content: Vec<Instruction<E>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Output {
    pub name: Option<Name>,
    pub properties: Vec<(Name, String)>,
    pub precedence: u32,
}

/// A strip-space or preserve-space entry; later precedence wins, ties go
/// to the more specific test.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SpaceRule {
    pub test: NameTest,
    pub strip: bool,
    pub precedence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NamespaceAlias {
    /// Empty string for the no-namespace form of `#default`.
    pub stylesheet_uri: String,
    pub result_uri: String,
    pub result_prefix: Option<String>,
    pub precedence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SchemaImport {
    pub namespace: Option<String>,
    pub schema_location: Option<String>,
    /// Present when the declaration carried an inline xs:schema that the
    /// external schema parser accepted.
    pub inline: bool,
}

/// The sealed output of a compilation: every declaration of the
/// stylesheet and its imports, linked by import precedence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Stylesheet<E> {
    pub version: Decimal,
    pub base_uri: Option<String>,
    pub namespaces: Namespaces,
    pub default_validation: Validation,
    pub default_collation: Option<String>,
    pub default_mode: ModeName,

    pub templates: Vec<Template<E>>,
    pub rules: Vec<TemplateRule<E>>,
    pub named_templates: HashMap<Name, TemplateId>,
    /// Topologically ordered so each initializer precedes its users.
    pub globals: Vec<GlobalVariable<E>>,
    pub functions: HashMap<(Name, usize), Function<E>>,
    pub keys: HashMap<Name, Vec<Key<E>>>,
    pub attribute_sets: HashMap<Name, Vec<AttributeSet<E>>>,
    pub character_maps: HashMap<Name, CharacterMap>,
    pub accumulators: HashMap<Name, Accumulator<E>>,
    pub modes: HashMap<ModeName, ModeDecl>,
    pub decimal_formats: HashMap<Option<Name>, DecimalFormat>,
    pub outputs: Vec<Output>,
    pub space_rules: Vec<SpaceRule>,
    pub namespace_aliases: HashMap<String, NamespaceAlias>,
    pub schema_imports: Vec<SchemaImport>,
}

impl<E> Stylesheet<E> {
    /// The rules of one mode, strongest first: higher import precedence,
    /// then higher priority, then later declaration.
    pub fn rules_for_mode(&self, mode: &ModeName) -> Vec<&TemplateRule<E>> {
        use ordered_float::OrderedFloat;
        let mut rules: Vec<&TemplateRule<E>> = self
            .rules
            .iter()
            .filter(|r| &r.mode == mode || r.mode == ModeName::All)
            .collect();
        rules.sort_by_key(|r| {
            std::cmp::Reverse((r.precedence, OrderedFloat(r.priority), r.decl_index))
        });
        rules
    }

    pub fn function(&self, name: &Name, arity: usize) -> Option<&Function<E>> {
        self.functions.get(&(name.clone(), arity))
    }
}
