//! Processors for top-level declarations. Each consumes a popped element
//! context and registers its result on the stylesheet builder; the
//! linking declarations (xsl:import, xsl:include, xsl:use-package) call
//! out through the resolvers.

use ahash::HashSetExt;
use ordered_float::OrderedFloat;

use xsltc_ast::instruction::{Instruction, ModeName, TemplateMode, Visibility};
use xsltc_ast::stylesheet::{
    Accumulator, AttributeSet, CharacterMap, DecimalFormat, Function, GlobalVariable, Key,
    ModeDecl, NamespaceAlias, OnNoMatch, Output, SchemaImport, SpaceRule, Stylesheet, Template,
    TemplateRule,
};
use xsltc_ast::pattern::NameTest;
use xsltc_ast::{Error, ErrorCode, Result};
use xsltc_name::Name;

use crate::attributes::Attributes;
use crate::builder::Compiler;
use crate::context::{resolve_uri, ElementContext};
use crate::instructions::{leading_params, parse_name_test, plain_body, structure};
use crate::linker::ResolveKind;
use crate::names::{XsltElement, OUTPUT_PROPERTIES};
use crate::static_eval::{Atomic, StaticEvaluator};
use crate::stylesheet_builder::PENDING_PRECEDENCE;
use crate::xpath::XPathFacade;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ComponentKind {
    Template,
    Function,
    Variable,
    AttributeSet,
    Mode,
}

impl ComponentKind {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "template" => Ok(Self::Template),
            "function" => Ok(Self::Function),
            "variable" => Ok(Self::Variable),
            "attribute-set" => Ok(Self::AttributeSet),
            "mode" => Ok(Self::Mode),
            other => Err(Error::new(
                ErrorCode::XTSE0020,
                format!("invalid component kind '{}'", other),
            )),
        }
    }
}

/// One xsl:accept rule collected while an xsl:use-package element is
/// open.
#[derive(Debug)]
pub(crate) struct AcceptRule {
    pub kind: ComponentKind,
    pub tests: Vec<NameTest>,
    pub visibility: Visibility,
}

impl AcceptRule {
    pub(crate) fn covers(&self, kind: ComponentKind, name: &Name) -> bool {
        self.kind == kind && self.tests.iter().any(|test| test.matches(name))
    }
}

/// Where a declaration-level element was encountered: directly under the
/// stylesheet root, inside xsl:use-package, or inside xsl:override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclScope {
    TopLevel,
    UsePackage,
    Override,
}

pub(crate) fn compile_declaration<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    element: XsltElement,
    ctx: ElementContext<X::Expr>,
    scope: DeclScope,
) -> Result<()> {
    use XsltElement::*;
    match scope {
        DeclScope::UsePackage => {
            return match element {
                Accept => accept(compiler, ctx),
                // its children already registered themselves
                Override => Ok(()),
                other => Err(structure(format!(
                    "xsl:{} is not allowed inside xsl:use-package",
                    other
                ))),
            };
        }
        DeclScope::Override => {
            if !matches!(
                element,
                Template | Function | Variable | Param | AttributeSet
            ) {
                return Err(structure(format!(
                    "xsl:{} is not allowed inside xsl:override",
                    element
                )));
            }
        }
        DeclScope::TopLevel => {
            if matches!(element, Accept | Override) {
                return Err(structure(format!(
                    "xsl:{} is only allowed inside xsl:use-package",
                    element
                )));
            }
            if element != Import {
                compiler.builder.seen_non_import = true;
            }
        }
    }
    match element {
        Template => template(compiler, ctx),
        Variable | Param => global_variable(compiler, element == Param, ctx),
        Function => function(compiler, ctx),
        Key => key(compiler, ctx),
        AttributeSet => attribute_set(compiler, ctx),
        Output => output(compiler, ctx),
        CharacterMap => character_map(compiler, ctx),
        DecimalFormat => decimal_format(compiler, ctx),
        Mode => mode(compiler, ctx),
        Accumulator => accumulator(compiler, ctx),
        NamespaceAlias => namespace_alias(compiler, ctx),
        StripSpace | PreserveSpace => space_declaration(compiler, element == StripSpace, ctx),
        ImportSchema => import_schema(compiler, ctx),
        Import => import(compiler, ctx),
        Include => include(compiler, ctx),
        UsePackage => use_package(compiler, ctx),
        Expose => expose(compiler, ctx),
        GlobalContextItem => {
            // recorded for documentation only; the runtime owns its
            // semantics
            Ok(())
        }
        other => Err(structure(format!(
            "xsl:{} is not allowed at the top level of a stylesheet",
            other
        ))),
    }
}


fn template<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    mut ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let children = std::mem::take(&mut ctx.children);
    let a = Attributes::new(&ctx, compiler.facade);

    let name = match a.ctx.attribute("name") {
        Some(_) => Some(a.component_name("name")?),
        None => None,
    };
    let match_ = a.pattern("match")?;
    let priority = a
        .optional("priority", |s| {
            s.trim().parse::<f64>().map_err(|_| {
                Error::new(
                    ErrorCode::XTSE0020,
                    format!("priority must be a number, got '{}'", s),
                )
            })
        })?
        .map(OrderedFloat);
    let modes = a.mode_list("mode")?;

    if match_.is_none() {
        if name.is_none() {
            return Err(Error::new(
                ErrorCode::XTSE0500,
                "xsl:template requires a match attribute or a name attribute",
            ));
        }
        if priority.is_some() || !modes.is_empty() {
            return Err(Error::new(
                ErrorCode::XTSE0500,
                "priority and mode require a match attribute",
            ));
        }
    }

    let as_ = a.string("as");
    let visibility = a.visibility("visibility")?;

    // xsl:context-item may open the content, then the params, then the
    // body
    let mut children = children;
    if matches!(
        children.first(),
        Some(Instruction::ContextItemDecl { .. })
    ) {
        children.remove(0);
    }
    let (params, body) = leading_params(children)?;
    let body = plain_body(body)?;

    let default_mode = ctx.default_mode.clone();
    let id = compiler.builder.add_template(Template {
        name: name.clone(),
        modes: modes.clone(),
        params,
        as_,
        visibility,
        precedence: PENDING_PRECEDENCE,
        body,
    });
    if let Some(name) = name {
        compiler.builder.register_named_template(name, id);
    }

    if let Some(pattern) = match_ {
        let mode_names: Vec<ModeName> = if modes.is_empty() {
            vec![default_mode]
        } else {
            modes
                .iter()
                .map(|mode| match mode {
                    TemplateMode::All => ModeName::All,
                    TemplateMode::Unnamed => ModeName::Unnamed,
                    TemplateMode::Default => default_mode.clone(),
                    TemplateMode::Named(name) => ModeName::Named(name.clone()),
                })
                .collect()
        };
        // each top-level union branch becomes its own rule, with its own
        // default priority
        for branch in pattern.into_branches() {
            let branch_priority = priority
                .map(|p| p.into_inner())
                .unwrap_or_else(|| branch.default_priority_f64());
            let decl_index = compiler.session().next_decl_index();
            for mode in &mode_names {
                compiler.builder.add_rule(TemplateRule {
                    pattern: branch.clone(),
                    mode: mode.clone(),
                    priority: branch_priority,
                    precedence: PENDING_PRECEDENCE,
                    decl_index,
                    template: id,
                });
            }
        }
    }
    Ok(())
}

fn global_variable<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    is_param: bool,
    mut ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let children = std::mem::take(&mut ctx.children);
    let a = Attributes::new(&ctx, compiler.facade);

    let name = a.component_name("name")?;
    let static_ = a.boolean("static", false)?;
    let required = is_param && a.boolean("required", false)?;
    let select = a.xpath("select")?;
    if select.is_some() && children.iter().any(|c| !c.is_whitespace_text()) {
        return Err(structure(
            "a variable cannot have both a select attribute and content",
        ));
    }

    let mut static_value = None;
    if static_ {
        let value = evaluate_static(compiler, &ctx, is_param, required, &name)?;
        if let Some(value) = value {
            static_value = Some(value.string_value());
            compiler.static_variables.insert(name.clone(), value);
        }
    }

    let references = select
        .as_ref()
        .map(|expr| compiler.facade.variable_references(expr))
        .unwrap_or_default();

    compiler.builder.add_global(GlobalVariable {
        name,
        is_param,
        required,
        static_,
        select,
        as_: a.string("as"),
        visibility: a.visibility("visibility")?,
        content: plain_body(children)?,
        precedence: PENDING_PRECEDENCE,
        references,
        static_value,
    });
    Ok(())
}

/// Evaluate the initializer of a static variable or parameter with the
/// compile-time evaluator. A supplied static parameter wins over the
/// default; a required one with no supplied value is XTDE0050.
fn evaluate_static<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    ctx: &ElementContext<X::Expr>,
    is_param: bool,
    required: bool,
    name: &Name,
) -> Result<Option<Atomic>> {
    if is_param {
        if let Some(value) = compiler.static_parameters.get(name) {
            return Ok(Some(value.clone()));
        }
        if required {
            return Err(Error::new(
                ErrorCode::XTDE0050,
                format!(
                    "no value supplied for required static parameter '{}'",
                    name.to_clark()
                ),
            ));
        }
    }
    let Some(source) = ctx.attribute("select") else {
        // without select the default value is the empty string
        return Ok(Some(Atomic::String(String::new())));
    };
    let evaluator = StaticEvaluator::new(
        &compiler.static_variables,
        &ctx.bindings,
        ctx.base_uri.as_deref(),
    );
    match evaluator.evaluate(source) {
        Ok(value) => Ok(Some(value)),
        Err(error) => Err(Error::new(
            ErrorCode::XTSE0020,
            format!("cannot evaluate static expression '{}': {}", source, error),
        )),
    }
}

fn function<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    mut ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let children = std::mem::take(&mut ctx.children);
    let a = Attributes::new(&ctx, compiler.facade);

    let name = a.component_name("name")?;
    if name.namespace().is_none() {
        return Err(structure(
            "a stylesheet function must have a prefixed name",
        ));
    }
    let (params, body) = leading_params(children)?;
    for param in &params {
        if param.required && param.select.is_some() {
            return Err(structure("function parameters cannot have defaults"));
        }
    }
    compiler.builder.add_function(Function {
        name,
        params,
        as_: a.string("as"),
        visibility: a.visibility("visibility")?,
        override_extension_function: a
            .boolean_opt("override-extension-function")?
            .or(a.boolean_opt("override")?)
            .unwrap_or(true),
        cache: a.boolean("cache", false)?,
        precedence: PENDING_PRECEDENCE,
        body: plain_body(body)?,
    });
    Ok(())
}

fn key<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    mut ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let children = std::mem::take(&mut ctx.children);
    let a = Attributes::new(&ctx, compiler.facade);

    let name = a.component_name("name")?;
    let match_ = a.pattern_required("match")?;
    let use_ = a.xpath("use")?;
    let content = plain_body(children)?;
    let has_content = content.iter().any(|c| !c.is_whitespace_text());
    if use_.is_some() == has_content {
        return Err(structure(
            "xsl:key requires either a use attribute or content, not both",
        ));
    }
    compiler.builder.add_key(Key {
        name,
        match_,
        use_,
        content,
        collation: a.string("collation"),
        composite: a.boolean("composite", false)?,
    });
    Ok(())
}

fn attribute_set<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    mut ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let children = std::mem::take(&mut ctx.children);
    let a = Attributes::new(&ctx, compiler.facade);

    let name = a.component_name("name")?;
    let use_attribute_sets = a.name_list("use-attribute-sets")?;
    let mut attributes = Vec::new();
    for child in children {
        match child {
            attribute @ Instruction::Attribute { .. } => attributes.push(attribute),
            text if text.is_whitespace_text() => {}
            _ => {
                return Err(structure(
                    "xsl:attribute-set may contain only xsl:attribute elements",
                ))
            }
        }
    }
    compiler
        .builder
        .note_attribute_set_refs(&use_attribute_sets, &ctx.location);
    compiler.builder.add_attribute_set(AttributeSet {
        name,
        use_attribute_sets,
        visibility: a.visibility("visibility")?,
        precedence: PENDING_PRECEDENCE,
        attributes,
    });
    Ok(())
}

fn output<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let a = Attributes::new(&ctx, compiler.facade);
    let name = a.eqname("name")?;
    let mut properties = Vec::new();
    for attribute in &ctx.attributes {
        if attribute.uri.is_empty() && OUTPUT_PROPERTIES.contains(&attribute.local.as_str()) {
            properties.push((
                Name::unprefixed(&attribute.local),
                attribute.value.clone(),
            ));
        }
    }
    let character_maps = a.name_list("use-character-maps")?;
    compiler
        .builder
        .note_character_map_refs(&character_maps, &ctx.location);
    compiler.builder.add_output(Output {
        name,
        properties,
        precedence: PENDING_PRECEDENCE,
    });
    Ok(())
}

fn character_map<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    mut ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let children = std::mem::take(&mut ctx.children);
    let a = Attributes::new(&ctx, compiler.facade);

    let name = a.component_name("name")?;
    let use_character_maps = a.name_list("use-character-maps")?;
    let mut characters = Vec::new();
    for child in children {
        match child {
            Instruction::OutputCharacterItem { character, string } => {
                characters.push((character, string));
            }
            text if text.is_whitespace_text() => {}
            _ => {
                return Err(structure(
                    "xsl:character-map may contain only xsl:output-character elements",
                ))
            }
        }
    }
    compiler
        .builder
        .note_character_map_refs(&use_character_maps, &ctx.location);
    compiler.builder.add_character_map(CharacterMap {
        name,
        use_character_maps,
        characters,
        precedence: PENDING_PRECEDENCE,
    });
    Ok(())
}

fn decimal_format<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let a = Attributes::new(&ctx, compiler.facade);
    let name = match a.ctx.attribute("name") {
        Some(_) => Some(a.component_name("name")?),
        None => None,
    };
    let format = DecimalFormat {
        name,
        precedence: PENDING_PRECEDENCE,
        decimal_separator: a.char_default("decimal-separator", '.')?,
        grouping_separator: a.char_default("grouping-separator", ',')?,
        infinity: a.string("infinity").unwrap_or_else(|| "Infinity".to_string()),
        minus_sign: a.char_default("minus-sign", '-')?,
        nan: a.string("NaN").unwrap_or_else(|| "NaN".to_string()),
        percent: a.char_default("percent", '%')?,
        per_mille: a.char_default("per-mille", '\u{2030}')?,
        zero_digit: a.char_default("zero-digit", '0')?,
        digit: a.char_default("digit", '#')?,
        pattern_separator: a.char_default("pattern-separator", ';')?,
        exponent_separator: a.char_default("exponent-separator", 'e')?,
    };
    let pictures = format.picture_characters();
    let mut seen = ahash::HashSet::new();
    for character in pictures {
        if !seen.insert(character) {
            return Err(Error::new(
                ErrorCode::XTSE1300,
                format!(
                    "the character '{}' is used twice in the decimal format",
                    character
                ),
            ));
        }
    }
    compiler.builder.add_decimal_format(format);
    Ok(())
}

fn mode<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let a = Attributes::new(&ctx, compiler.facade);
    let name = match a.ctx.attribute("name") {
        None | Some("#unnamed") => ModeName::Unnamed,
        Some("#default") => ctx.default_mode.clone(),
        Some(_) => ModeName::Named(a.component_name("name")?),
    };
    let on_no_match = match a.string("on-no-match").as_deref() {
        None | Some("text-only-copy") => OnNoMatch::TextOnlyCopy,
        Some("shallow-copy") => OnNoMatch::ShallowCopy,
        Some("shallow-copy-all") => OnNoMatch::ShallowCopyAll,
        Some("deep-copy") => OnNoMatch::DeepCopy,
        Some("deep-skip") => OnNoMatch::DeepSkip,
        Some("shallow-skip") => OnNoMatch::ShallowSkip,
        Some("fail") => OnNoMatch::Fail,
        Some(other) => {
            return Err(Error::new(
                ErrorCode::XTSE0020,
                format!("invalid on-no-match '{}'", other),
            ))
        }
    };
    compiler.builder.add_mode(ModeDecl {
        name,
        on_no_match,
        streamable: a.boolean("streamable", false)?,
        warning_on_no_match: a.boolean("warning-on-no-match", false)?,
        use_accumulators: a.name_list("use-accumulators")?,
        precedence: PENDING_PRECEDENCE,
    });
    Ok(())
}

fn accumulator<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    mut ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let children = std::mem::take(&mut ctx.children);
    let a = Attributes::new(&ctx, compiler.facade);

    let name = a.component_name("name")?;
    let initial_value = a.xpath_required("initial-value")?;
    let mut rules = Vec::new();
    for child in children {
        match child {
            Instruction::AccumulatorRuleItem {
                match_,
                phase,
                select,
                content,
            } => rules.push(xsltc_ast::stylesheet::AccumulatorRule {
                match_,
                phase,
                select,
                content,
            }),
            text if text.is_whitespace_text() => {}
            _ => {
                return Err(structure(
                    "xsl:accumulator may contain only xsl:accumulator-rule elements",
                ))
            }
        }
    }
    if rules.is_empty() {
        return Err(structure(
            "xsl:accumulator requires at least one xsl:accumulator-rule",
        ));
    }
    compiler.builder.add_accumulator(Accumulator {
        name,
        initial_value,
        as_: a.string("as"),
        streamable: a.boolean("streamable", false)?,
        precedence: PENDING_PRECEDENCE,
        rules,
    });
    Ok(())
}

fn namespace_alias<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let a = Attributes::new(&ctx, compiler.facade);
    let resolve = |attribute: &str| -> Result<(String, Option<String>)> {
        let value = a.string_required(attribute)?;
        if value == "#default" {
            // an undeclared default namespace maps to the empty URI
            Ok((
                ctx.bindings.default_element_namespace().to_string(),
                None,
            ))
        } else {
            let uri = ctx.bindings.by_prefix(&value).ok_or_else(|| {
                Error::new(
                    ErrorCode::XTSE0280,
                    format!("undeclared namespace prefix '{}'", value),
                )
            })?;
            Ok((uri.to_string(), Some(value)))
        }
    };
    let (stylesheet_uri, _) = resolve("stylesheet-prefix")?;
    let (result_uri, result_prefix) = resolve("result-prefix")?;
    if stylesheet_uri == result_uri {
        return Err(structure(
            "xsl:namespace-alias requires distinct stylesheet and result namespaces",
        ));
    }
    compiler.builder.add_alias(NamespaceAlias {
        stylesheet_uri,
        result_uri,
        result_prefix,
        precedence: PENDING_PRECEDENCE,
    });
    Ok(())
}

fn space_declaration<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    strip: bool,
    ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let a = Attributes::new(&ctx, compiler.facade);
    a.require_empty()?;
    let value = a.string_required("elements")?;
    let mut rules = Vec::new();
    for token in value.split_whitespace() {
        rules.push(SpaceRule {
            test: parse_name_test(&a, token)?,
            strip,
            precedence: PENDING_PRECEDENCE,
        });
    }
    compiler.builder.add_space_rules(rules);
    Ok(())
}

fn import_schema<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let a = Attributes::new(&ctx, compiler.facade);
    let inline = compiler.take_inline_schema_seen();
    compiler.builder.add_schema_import(SchemaImport {
        namespace: a.string("namespace"),
        schema_location: a.string("schema-location"),
        inline,
    });
    Ok(())
}

fn import<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    ctx: ElementContext<X::Expr>,
) -> Result<()> {
    if compiler.builder.seen_non_import {
        return Err(structure(
            "xsl:import must precede all other declarations",
        ));
    }
    load_module(compiler, ctx, ResolveKind::Import)
}

fn include<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    ctx: ElementContext<X::Expr>,
) -> Result<()> {
    load_module(compiler, ctx, ResolveKind::Include)
}

fn load_module<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    ctx: ElementContext<X::Expr>,
    kind: ResolveKind,
) -> Result<()> {
    let a = Attributes::new(&ctx, compiler.facade);
    a.require_empty()?;
    let href = a.string_required("href")?;
    let resolved = resolve_uri(ctx.base_uri.as_deref(), &href);
    let module = compiler.resolve_module(&resolved, ctx.base_uri.as_deref(), kind)?;
    compiler.builder.merge(module);
    Ok(())
}

fn use_package<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let a = Attributes::new(&ctx, compiler.facade);
    let name = a.string_required("name")?;
    let version = a.string("package-version");
    let mut package =
        compiler.resolve_package(&name, version.as_deref(), ctx.base_uri.as_deref())?;

    let accepts = std::mem::take(&mut compiler.pending_accepts);
    let overrides = std::mem::take(&mut compiler.pending_overrides);
    apply_package_rules(&mut package, &accepts, &overrides)?;
    compiler.builder.merge(package);
    Ok(())
}

/// Filter a used package's components by visibility: private components
/// never cross, xsl:accept can hide or re-expose, and abstract components
/// must be overridden.
fn apply_package_rules<E>(
    package: &mut Stylesheet<E>,
    accepts: &[AcceptRule],
    overrides: &[(ComponentKind, Name)],
) -> Result<()> {
    let effective = |kind: ComponentKind, name: &Name, declared: Visibility| -> Result<Option<Visibility>> {
        let accepted = accepts
            .iter()
            .find(|rule| rule.covers(kind, name))
            .map(|rule| rule.visibility);
        let visibility = accepted.unwrap_or(declared);
        match declared {
            Visibility::Private => Ok(None),
            Visibility::Final if visibility == Visibility::Public => Err(Error::new(
                ErrorCode::XTSE3085,
                format!(
                    "'{}' is final and cannot be accepted as public",
                    name.to_clark()
                ),
            )),
            Visibility::Abstract => {
                if overrides
                    .iter()
                    .any(|(k, n)| *k == kind && n == name)
                {
                    Ok(Some(visibility))
                } else {
                    Err(Error::new(
                        ErrorCode::XTSE3010,
                        format!(
                            "abstract component '{}' is not overridden",
                            name.to_clark()
                        ),
                    ))
                }
            }
            _ => {
                if visibility == Visibility::Hidden {
                    Ok(None)
                } else {
                    Ok(Some(visibility))
                }
            }
        }
    };

    let mut hidden_templates = ahash::HashSet::new();
    let named = std::mem::take(&mut package.named_templates);
    package.named_templates = named
        .into_iter()
        .filter_map(|(name, id)| {
            let declared = package.templates[id].visibility;
            match effective(ComponentKind::Template, &name, declared) {
                Ok(Some(visibility)) => {
                    package.templates[id].visibility = visibility;
                    Some(Ok((name, id)))
                }
                Ok(None) => {
                    hidden_templates.insert(id);
                    None
                }
                Err(error) => Some(Err(error)),
            }
        })
        .collect::<Result<_>>()?;

    package.globals = std::mem::take(&mut package.globals)
        .into_iter()
        .filter_map(|mut global| {
            match effective(ComponentKind::Variable, &global.name, global.visibility) {
                Ok(Some(visibility)) => {
                    global.visibility = visibility;
                    Some(Ok(global))
                }
                Ok(None) => None,
                Err(error) => Some(Err(error)),
            }
        })
        .collect::<Result<_>>()?;

    package.functions = std::mem::take(&mut package.functions)
        .into_iter()
        .filter_map(|(key, mut function)| {
            match effective(ComponentKind::Function, &function.name, function.visibility) {
                Ok(Some(visibility)) => {
                    function.visibility = visibility;
                    Some(Ok((key, function)))
                }
                Ok(None) => None,
                Err(error) => Some(Err(error)),
            }
        })
        .collect::<Result<_>>()?;

    package.attribute_sets = std::mem::take(&mut package.attribute_sets)
        .into_iter()
        .filter_map(|(name, mut sets)| {
            let declared = sets
                .iter()
                .map(|set| set.visibility)
                .next()
                .unwrap_or_default();
            match effective(ComponentKind::AttributeSet, &name, declared) {
                Ok(Some(visibility)) => {
                    for set in &mut sets {
                        set.visibility = visibility;
                    }
                    Some(Ok((name, sets)))
                }
                Ok(None) => None,
                Err(error) => Some(Err(error)),
            }
        })
        .collect::<Result<_>>()?;

    package
        .rules
        .retain(|rule| !hidden_templates.contains(&rule.template));
    Ok(())
}

fn accept<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let a = Attributes::new(&ctx, compiler.facade);
    a.require_empty()?;
    let rule = accept_rule(&a)?;
    compiler.pending_accepts.push(rule);
    Ok(())
}

fn expose<X: XPathFacade>(
    compiler: &mut Compiler<'_, X>,
    ctx: ElementContext<X::Expr>,
) -> Result<()> {
    let a = Attributes::new(&ctx, compiler.facade);
    a.require_empty()?;
    let rule = accept_rule(&a)?;
    compiler.expose_rules.push(rule);
    Ok(())
}

fn accept_rule<X: XPathFacade>(a: &Attributes<'_, X>) -> Result<AcceptRule> {
    let kind = ComponentKind::parse(&a.string_required("component")?)?;
    let names = a.string_required("names")?;
    let mut tests = Vec::new();
    for token in names.split_whitespace() {
        // function names may carry an arity suffix
        let token = token.split('#').next().unwrap_or(token);
        tests.push(parse_name_test(a, token)?);
    }
    Ok(AcceptRule {
        kind,
        tests,
        visibility: a.visibility("visibility")?,
    })
}
