use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use rust_decimal::Decimal;

use xsltc_ast::instruction::{ModeName, Validation};
use xsltc_ast::stylesheet::{
    Accumulator, AttributeSet, CharacterMap, DecimalFormat, Function, GlobalVariable, Key,
    ModeDecl, NamespaceAlias, Output, SchemaImport, SpaceRule, Stylesheet, Template, TemplateId,
    TemplateRule,
};
use xsltc_ast::{Error, ErrorCode, Result, SourceLocation};
use xsltc_name::{Name, Namespaces};

/// Locally declared components carry this until sealing patches in the
/// module's real precedence. Imported components always carry a smaller,
/// already-assigned value.
pub(crate) const PENDING_PRECEDENCE: u32 = u32::MAX;

/// Accumulates every declaration of one stylesheet module plus its
/// imports, then seals into the immutable Stylesheet value.
pub(crate) struct StylesheetBuilder<E> {
    pub version: Decimal,
    pub base_uri: Option<String>,
    pub namespaces: Namespaces,
    pub default_validation: Validation,
    pub default_collation: Option<String>,
    pub default_mode: ModeName,

    templates: Vec<Template<E>>,
    rules: Vec<TemplateRule<E>>,
    named: Vec<(Name, TemplateId)>,
    globals: Vec<GlobalVariable<E>>,
    functions: Vec<Function<E>>,
    keys: HashMap<Name, Vec<Key<E>>>,
    attribute_sets: HashMap<Name, Vec<AttributeSet<E>>>,
    character_maps: Vec<CharacterMap>,
    accumulators: Vec<Accumulator<E>>,
    modes: Vec<ModeDecl>,
    decimal_formats: Vec<DecimalFormat>,
    outputs: Vec<Output>,
    space_rules: Vec<SpaceRule>,
    aliases: Vec<NamespaceAlias>,
    schema_imports: Vec<SchemaImport>,

    attribute_set_refs: Vec<(Name, SourceLocation)>,
    character_map_refs: Vec<(Name, SourceLocation)>,
    /// Set once any declaration other than xsl:import is seen; xsl:import
    /// must precede everything else.
    pub seen_non_import: bool,
}

impl<E: Clone> StylesheetBuilder<E> {
    pub fn new() -> Self {
        Self {
            version: xsltc_ast::instruction::xslt_30(),
            base_uri: None,
            namespaces: Namespaces::default(),
            default_validation: Validation::Strip,
            default_collation: None,
            default_mode: ModeName::Unnamed,
            templates: Vec::new(),
            rules: Vec::new(),
            named: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
            keys: HashMap::new(),
            attribute_sets: HashMap::new(),
            character_maps: Vec::new(),
            accumulators: Vec::new(),
            modes: Vec::new(),
            decimal_formats: Vec::new(),
            outputs: Vec::new(),
            space_rules: Vec::new(),
            aliases: Vec::new(),
            schema_imports: Vec::new(),
            attribute_set_refs: Vec::new(),
            character_map_refs: Vec::new(),
            seen_non_import: false,
        }
    }

    pub fn add_template(&mut self, template: Template<E>) -> TemplateId {
        let id = self.templates.len();
        self.templates.push(template);
        id
    }

    pub fn add_rule(&mut self, rule: TemplateRule<E>) {
        self.rules.push(rule);
    }

    pub fn register_named_template(&mut self, name: Name, id: TemplateId) {
        self.named.push((name, id));
    }

    pub fn add_global(&mut self, variable: GlobalVariable<E>) {
        self.globals.push(variable);
    }

    pub fn add_function(&mut self, function: Function<E>) {
        self.functions.push(function);
    }

    pub fn add_key(&mut self, key: Key<E>) {
        self.keys.entry(key.name.clone()).or_default().push(key);
    }

    pub fn add_attribute_set(&mut self, set: AttributeSet<E>) {
        self.attribute_sets
            .entry(set.name.clone())
            .or_default()
            .push(set);
    }

    pub fn add_character_map(&mut self, map: CharacterMap) {
        self.character_maps.push(map);
    }

    pub fn add_accumulator(&mut self, accumulator: Accumulator<E>) {
        self.accumulators.push(accumulator);
    }

    pub fn add_mode(&mut self, mode: ModeDecl) {
        self.modes.push(mode);
    }

    pub fn add_decimal_format(&mut self, format: DecimalFormat) {
        self.decimal_formats.push(format);
    }

    pub fn add_output(&mut self, output: Output) {
        self.outputs.push(output);
    }

    pub fn add_space_rules(&mut self, rules: impl IntoIterator<Item = SpaceRule>) {
        self.space_rules.extend(rules);
    }

    pub fn add_alias(&mut self, alias: NamespaceAlias) {
        self.aliases.push(alias);
    }

    pub fn add_schema_import(&mut self, import: SchemaImport) {
        self.schema_imports.push(import);
    }

    /// References can precede the declarations they name, so they are
    /// validated at seal time.
    pub fn note_attribute_set_refs(
        &mut self,
        names: &[Name],
        location: &SourceLocation,
    ) {
        for name in names {
            self.attribute_set_refs
                .push((name.clone(), location.clone()));
        }
    }

    pub fn note_character_map_refs(&mut self, names: &[Name], location: &SourceLocation) {
        for name in names {
            self.character_map_refs
                .push((name.clone(), location.clone()));
        }
    }

    /// Apply xsl:expose rules to this package's own components.
    pub fn apply_expose(&mut self, rules: &[crate::declarations::AcceptRule]) {
        use crate::declarations::ComponentKind;
        if rules.is_empty() {
            return;
        }
        let exposed = |kind: ComponentKind, name: &Name| {
            rules
                .iter()
                .find(|rule| rule.covers(kind, name))
                .map(|rule| rule.visibility)
        };
        for (name, id) in &self.named {
            if let Some(visibility) = exposed(ComponentKind::Template, name) {
                self.templates[*id].visibility = visibility;
            }
        }
        for global in &mut self.globals {
            if let Some(visibility) = exposed(ComponentKind::Variable, &global.name) {
                global.visibility = visibility;
            }
        }
        for function in &mut self.functions {
            if let Some(visibility) = exposed(ComponentKind::Function, &function.name) {
                function.visibility = visibility;
            }
        }
        for sets in self.attribute_sets.values_mut() {
            for set in sets {
                if let Some(visibility) = exposed(ComponentKind::AttributeSet, &set.name) {
                    set.visibility = visibility;
                }
            }
        }
    }

    /// Merge an imported or included module. Its components keep their
    /// own precedences (an included module's are PENDING, patched with
    /// ours at seal). Imported components come first so local
    /// declarations shadow on conflict.
    pub fn merge(&mut self, other: Stylesheet<E>) {
        let offset = self.templates.len();
        self.templates.extend(other.templates);
        for mut rule in other.rules {
            rule.template += offset;
            self.rules.push(rule);
        }
        for (name, id) in other.named_templates {
            self.named.push((name, id + offset));
        }
        self.globals.extend(other.globals);
        self.functions.extend(other.functions.into_values());
        for (name, keys) in other.keys {
            self.keys.entry(name).or_default().extend(keys);
        }
        for (name, sets) in other.attribute_sets {
            self.attribute_sets.entry(name).or_default().extend(sets);
        }
        self.character_maps.extend(other.character_maps.into_values());
        self.accumulators.extend(other.accumulators.into_values());
        self.modes.extend(other.modes.into_values());
        self.decimal_formats
            .extend(other.decimal_formats.into_values());
        self.outputs.extend(other.outputs);
        self.space_rules.extend(other.space_rules);
        self.aliases.extend(other.namespace_aliases.into_values());
        self.schema_imports.extend(other.schema_imports);
    }

    /// Seal the builder: patch the pending precedence, run the deferred
    /// duplicate and reference checks, order the globals, and produce the
    /// final value.
    pub fn seal(mut self, own_precedence: u32) -> Result<Stylesheet<E>> {
        let patch = |p: &mut u32| {
            if *p == PENDING_PRECEDENCE {
                *p = own_precedence;
            }
        };
        for template in &mut self.templates {
            patch(&mut template.precedence);
        }
        for rule in &mut self.rules {
            patch(&mut rule.precedence);
        }
        for global in &mut self.globals {
            patch(&mut global.precedence);
        }
        for function in &mut self.functions {
            patch(&mut function.precedence);
        }
        for map in &mut self.character_maps {
            patch(&mut map.precedence);
        }
        for accumulator in &mut self.accumulators {
            patch(&mut accumulator.precedence);
        }
        for mode in &mut self.modes {
            patch(&mut mode.precedence);
        }
        for format in &mut self.decimal_formats {
            patch(&mut format.precedence);
        }
        for output in &mut self.outputs {
            patch(&mut output.precedence);
        }
        for rule in &mut self.space_rules {
            patch(&mut rule.precedence);
        }
        for alias in &mut self.aliases {
            patch(&mut alias.precedence);
        }
        for sets in self.attribute_sets.values_mut() {
            for set in sets {
                patch(&mut set.precedence);
            }
        }

        let named_templates = self.resolve_named_templates()?;
        self.check_duplicate_globals()?;
        let globals = order_globals(std::mem::take(&mut self.globals))?;
        let functions = self.resolve_functions()?;
        let character_maps = self.resolve_character_maps()?;
        let accumulators = self.resolve_accumulators()?;
        let modes = self.resolve_modes()?;
        let decimal_formats = self.resolve_decimal_formats()?;
        let namespace_aliases = self.resolve_aliases();

        for (name, location) in &self.attribute_set_refs {
            if !self.attribute_sets.contains_key(name) {
                return Err(Error::new(
                    ErrorCode::XTSE0710,
                    format!("no attribute set named '{}'", name.to_clark()),
                )
                .with_location(location.clone()));
            }
        }
        for (name, location) in &self.character_map_refs {
            if !character_maps.contains_key(name) {
                return Err(Error::new(
                    ErrorCode::XTSE1660,
                    format!("no character map named '{}'", name.to_clark()),
                )
                .with_location(location.clone()));
            }
        }

        Ok(Stylesheet {
            version: self.version,
            base_uri: self.base_uri,
            namespaces: self.namespaces,
            default_validation: self.default_validation,
            default_collation: self.default_collation,
            default_mode: self.default_mode,
            templates: self.templates,
            rules: self.rules,
            named_templates,
            globals,
            functions,
            keys: self.keys,
            attribute_sets: self.attribute_sets,
            character_maps,
            accumulators,
            modes,
            decimal_formats,
            outputs: self.outputs,
            space_rules: self.space_rules,
            namespace_aliases,
            schema_imports: self.schema_imports,
        })
    }

    fn resolve_named_templates(&self) -> Result<HashMap<Name, TemplateId>> {
        let mut best: HashMap<Name, TemplateId> = HashMap::new();
        for (name, id) in &self.named {
            let precedence = self.templates[*id].precedence;
            match best.get(name) {
                Some(existing) => {
                    let existing_precedence = self.templates[*existing].precedence;
                    if existing_precedence == precedence {
                        return Err(Error::new(
                            ErrorCode::XTSE0660,
                            format!(
                                "duplicate named template '{}' at the same import precedence",
                                name.to_clark()
                            ),
                        ));
                    }
                    if precedence > existing_precedence {
                        best.insert(name.clone(), *id);
                    }
                }
                None => {
                    best.insert(name.clone(), *id);
                }
            }
        }
        Ok(best)
    }

    fn check_duplicate_globals(&self) -> Result<()> {
        let mut seen: HashMap<&Name, u32> = HashMap::new();
        for global in &self.globals {
            if let Some(precedence) = seen.get(&global.name) {
                if *precedence == global.precedence {
                    return Err(Error::new(
                        ErrorCode::XTSE0630,
                        format!(
                            "duplicate global variable '{}' at the same import precedence",
                            global.name.to_clark()
                        ),
                    ));
                }
            }
            seen.insert(&global.name, global.precedence);
        }
        Ok(())
    }

    fn resolve_functions(&self) -> Result<HashMap<(Name, usize), Function<E>>> {
        let mut best: HashMap<(Name, usize), Function<E>> = HashMap::new();
        for function in &self.functions {
            let key = (function.name.clone(), function.arity());
            match best.get(&key) {
                Some(existing) => {
                    if existing.precedence == function.precedence {
                        return Err(Error::new(
                            ErrorCode::XTSE0630,
                            format!(
                                "duplicate function '{}#{}' at the same import precedence",
                                function.name.to_clark(),
                                function.arity()
                            ),
                        ));
                    }
                    if function.precedence > existing.precedence {
                        best.insert(key, function.clone());
                    }
                }
                None => {
                    best.insert(key, function.clone());
                }
            }
        }
        Ok(best)
    }

    fn resolve_character_maps(&self) -> Result<HashMap<Name, CharacterMap>> {
        let mut best: HashMap<Name, CharacterMap> = HashMap::new();
        for map in &self.character_maps {
            match best.get(&map.name) {
                Some(existing) => {
                    if existing.precedence == map.precedence {
                        return Err(Error::new(
                            ErrorCode::XTSE1580,
                            format!(
                                "duplicate character map '{}' at the same import precedence",
                                map.name.to_clark()
                            ),
                        ));
                    }
                    if map.precedence > existing.precedence {
                        best.insert(map.name.clone(), map.clone());
                    }
                }
                None => {
                    best.insert(map.name.clone(), map.clone());
                }
            }
        }
        Ok(best)
    }

    fn resolve_accumulators(&self) -> Result<HashMap<Name, Accumulator<E>>> {
        let mut best: HashMap<Name, Accumulator<E>> = HashMap::new();
        for accumulator in &self.accumulators {
            match best.get(&accumulator.name) {
                Some(existing) => {
                    if existing.precedence == accumulator.precedence {
                        return Err(Error::new(
                            ErrorCode::XTSE1505,
                            format!(
                                "duplicate accumulator '{}' at the same import precedence",
                                accumulator.name.to_clark()
                            ),
                        ));
                    }
                    if accumulator.precedence > existing.precedence {
                        best.insert(accumulator.name.clone(), accumulator.clone());
                    }
                }
                None => {
                    best.insert(accumulator.name.clone(), accumulator.clone());
                }
            }
        }
        Ok(best)
    }

    fn resolve_modes(&self) -> Result<HashMap<ModeName, ModeDecl>> {
        let mut best: HashMap<ModeName, ModeDecl> = HashMap::new();
        for mode in &self.modes {
            match best.get(&mode.name) {
                Some(existing) => {
                    if existing.precedence == mode.precedence {
                        return Err(Error::new(
                            ErrorCode::XTSE1505,
                            "duplicate xsl:mode declaration at the same import precedence",
                        ));
                    }
                    if mode.precedence > existing.precedence {
                        best.insert(mode.name.clone(), mode.clone());
                    }
                }
                None => {
                    best.insert(mode.name.clone(), mode.clone());
                }
            }
        }
        Ok(best)
    }

    fn resolve_decimal_formats(&self) -> Result<HashMap<Option<Name>, DecimalFormat>> {
        let mut best: HashMap<Option<Name>, DecimalFormat> = HashMap::new();
        for format in &self.decimal_formats {
            match best.get(&format.name) {
                Some(existing) => {
                    if existing.precedence == format.precedence && existing != format {
                        return Err(Error::new(
                            ErrorCode::XTSE1505,
                            "conflicting xsl:decimal-format declarations at the same import precedence",
                        ));
                    }
                    if format.precedence > existing.precedence {
                        best.insert(format.name.clone(), format.clone());
                    }
                }
                None => {
                    best.insert(format.name.clone(), format.clone());
                }
            }
        }
        Ok(best)
    }

    fn resolve_aliases(&self) -> HashMap<String, NamespaceAlias> {
        let mut best: HashMap<String, NamespaceAlias> = HashMap::new();
        for alias in &self.aliases {
            match best.get(&alias.stylesheet_uri) {
                Some(existing) if existing.precedence >= alias.precedence => {}
                _ => {
                    best.insert(alias.stylesheet_uri.clone(), alias.clone());
                }
            }
        }
        best
    }
}

/// Topologically order global variables so every initializer precedes its
/// users; a cycle among them is XTDE0640.
fn order_globals<E>(globals: Vec<GlobalVariable<E>>) -> Result<Vec<GlobalVariable<E>>> {
    let mut by_name: HashMap<Name, usize> = HashMap::new();
    for (index, global) in globals.iter().enumerate() {
        // on redeclaration the higher-precedence (later-merged) entry wins
        // the name; duplicates were already checked
        by_name.insert(global.name.clone(), index);
    }

    let mut ordered_indices = Vec::with_capacity(globals.len());
    let mut done: HashSet<usize> = HashSet::new();
    let mut in_progress: HashSet<usize> = HashSet::new();

    fn visit<E>(
        index: usize,
        globals: &[GlobalVariable<E>],
        by_name: &HashMap<Name, usize>,
        done: &mut HashSet<usize>,
        in_progress: &mut HashSet<usize>,
        ordered: &mut Vec<usize>,
    ) -> Result<()> {
        if done.contains(&index) {
            return Ok(());
        }
        if !in_progress.insert(index) {
            return Err(Error::new(
                ErrorCode::XTDE0640,
                format!(
                    "global variable '{}' depends on itself",
                    globals[index].name.to_clark()
                ),
            ));
        }
        for reference in &globals[index].references {
            if let Some(&target) = by_name.get(reference) {
                visit(target, globals, by_name, done, in_progress, ordered)?;
            }
        }
        in_progress.remove(&index);
        done.insert(index);
        ordered.push(index);
        Ok(())
    }

    for index in 0..globals.len() {
        visit(
            index,
            &globals,
            &by_name,
            &mut done,
            &mut in_progress,
            &mut ordered_indices,
        )?;
    }

    let mut slots: Vec<Option<GlobalVariable<E>>> = globals.into_iter().map(Some).collect();
    Ok(ordered_indices
        .into_iter()
        .map(|i| slots[i].take().expect("each index appears once"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(name: &str, references: &[&str]) -> GlobalVariable<String> {
        GlobalVariable {
            name: Name::unprefixed(name),
            is_param: false,
            required: false,
            static_: false,
            select: Some("...".to_string()),
            as_: None,
            visibility: Default::default(),
            content: vec![],
            precedence: 1,
            references: references.iter().map(|r| Name::unprefixed(r)).collect(),
            static_value: None,
        }
    }

    #[test]
    fn test_order_globals_simple() {
        let ordered = order_globals(vec![global("a", &["b"]), global("b", &[])]).unwrap();
        assert_eq!(ordered[0].name, Name::unprefixed("b"));
        assert_eq!(ordered[1].name, Name::unprefixed("a"));
    }

    #[test]
    fn test_order_globals_cycle() {
        let error = order_globals(vec![global("a", &["b"]), global("b", &["a"])]).unwrap_err();
        assert_eq!(error.code, ErrorCode::XTDE0640);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let error = order_globals(vec![global("a", &["a"])]).unwrap_err();
        assert_eq!(error.code, ErrorCode::XTDE0640);
    }

    #[test]
    fn test_unknown_references_are_ignored() {
        // parameters supplied externally or functions are not globals
        let ordered = order_globals(vec![global("a", &["external"])]).unwrap();
        assert_eq!(ordered.len(), 1);
    }
}
