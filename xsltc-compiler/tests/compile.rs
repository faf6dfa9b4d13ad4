mod common;

use std::cell::RefCell;
use std::rc::Rc;

use ahash::{HashMap, HashMapExt};
use rust_decimal_macros::dec;

use common::{compile, feed};
use xsltc_ast::instruction::{Instruction, ModeName};
use xsltc_ast::pattern::Pattern;
use xsltc_ast::stylesheet::Stylesheet;
use xsltc_ast::value_template::Fragment;
use xsltc_ast::ErrorCode;
use xsltc_compiler::{
    Compiler, ResolveKind, Session, SourceExpr, SourceFacade, StylesheetResolver,
};

const XSL: &str = "http://www.w3.org/1999/XSL/Transform";

fn wrap(body: &str) -> String {
    format!(
        r#"<xsl:stylesheet version="3.0" xmlns:xsl="{}">{}</xsl:stylesheet>"#,
        XSL, body
    )
}

fn first_body(stylesheet: &Stylesheet<SourceExpr>) -> &[Instruction<SourceExpr>] {
    &stylesheet.templates[0].body
}

#[test]
fn test_minimal_stylesheet() {
    let stylesheet = compile(
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"><xsl:template match="/"><out/></xsl:template></xsl:stylesheet>"#,
    )
    .unwrap();
    assert_eq!(stylesheet.version, dec!(1.0));
    assert_eq!(stylesheet.rules.len(), 1);
    let rule = &stylesheet.rules[0];
    assert_eq!(rule.pattern, Pattern::Root);
    assert_eq!(rule.priority, 0.5);
    assert_eq!(rule.mode, ModeName::Unnamed);
    let body = &stylesheet.templates[rule.template].body;
    match &body[0] {
        Instruction::LiteralElement {
            name, namespaces, ..
        } => {
            assert_eq!(name.local(), "out");
            assert_eq!(name.namespace(), None);
            assert!(namespaces.iter().all(|(_, uri)| uri != XSL));
        }
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_simplified_stylesheet() {
    let stylesheet = compile(
        r#"<out xsl:version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"/>"#,
    )
    .unwrap();
    assert_eq!(stylesheet.version, dec!(1.0));
    assert_eq!(stylesheet.rules.len(), 1);
    assert_eq!(stylesheet.rules[0].pattern, Pattern::Root);
    match &first_body(&stylesheet)[0] {
        Instruction::LiteralElement { name, .. } => assert_eq!(name.local(), "out"),
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_root_lre_without_version_is_rejected() {
    let error = compile(r#"<out xmlns:xsl="http://www.w3.org/1999/XSL/Transform"/>"#).unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0150);
}

#[test]
fn test_wrong_namespace_document_element() {
    let error = compile(r#"<stylesheet version="1.0"/>"#).unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0150);
}

#[test]
fn test_reserved_namespace_in_template_name() {
    let error = compile(&wrap(r#"<xsl:template name="xsl:foo"><out/></xsl:template>"#))
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0080);
}

#[test]
fn test_initial_template_is_the_reserved_exception() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template name="xsl:initial-template"><out/></xsl:template>"#,
    ))
    .unwrap();
    assert_eq!(stylesheet.named_templates.len(), 1);
}

/// Resolves hrefs from an in-memory module table by running a nested
/// compiler within the shared session.
struct MapResolver {
    modules: HashMap<String, String>,
}

impl StylesheetResolver<SourceExpr> for MapResolver {
    fn resolve(
        &mut self,
        href: &str,
        _base: Option<&str>,
        kind: ResolveKind,
        session: &mut Session,
    ) -> xsltc_ast::Result<Stylesheet<SourceExpr>> {
        let xml = self
            .modules
            .get(href)
            .unwrap_or_else(|| panic!("unknown module {}", href))
            .clone();
        let facade = SourceFacade;
        let mut nested = MapResolver {
            modules: self.modules.clone(),
        };
        let mut compiler = Compiler::with_session(&facade, session);
        compiler.set_resolver(&mut nested);
        compiler.set_base_uri(href);
        feed(&mut compiler, &xml)?;
        match kind {
            ResolveKind::Import => compiler.into_stylesheet(),
            ResolveKind::Include => compiler.into_included_stylesheet(),
        }
    }
}

fn module(import_href: Option<&str>, element: &str) -> String {
    let import = match import_href {
        Some(href) => format!(r#"<xsl:import href="{}"/>"#, href),
        None => String::new(),
    };
    wrap(&format!(
        r#"{}<xsl:template match="x"><{}/></xsl:template>"#,
        import, element
    ))
}

fn body_element_name(stylesheet: &Stylesheet<SourceExpr>, template: usize) -> String {
    match &stylesheet.templates[template].body[0] {
        Instruction::LiteralElement { name, .. } => name.local().to_string(),
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_import_precedence_order() {
    let mut modules = HashMap::new();
    modules.insert(
        "file:///b.xsl".to_string(),
        module(Some("c.xsl"), "b"),
    );
    modules.insert("file:///c.xsl".to_string(), module(None, "c"));
    let mut resolver = MapResolver { modules };

    let facade = SourceFacade;
    let mut compiler = Compiler::new(&facade);
    compiler.set_resolver(&mut resolver);
    compiler.set_base_uri("file:///a.xsl");
    feed(&mut compiler, &module(Some("b.xsl"), "a")).unwrap();
    let stylesheet = compiler.into_stylesheet().unwrap();

    assert_eq!(stylesheet.rules.len(), 3);
    let mut by_name: HashMap<String, u32> = HashMap::new();
    for rule in &stylesheet.rules {
        by_name.insert(body_element_name(&stylesheet, rule.template), rule.precedence);
    }
    assert!(by_name["a"] > by_name["b"]);
    assert!(by_name["b"] > by_name["c"]);

    // the strongest rule in the unnamed mode is the importing module's
    let ordered = stylesheet.rules_for_mode(&ModeName::Unnamed);
    assert_eq!(body_element_name(&stylesheet, ordered[0].template), "a");
}

#[test]
fn test_include_inherits_precedence() {
    let mut modules = HashMap::new();
    modules.insert("file:///b.xsl".to_string(), module(None, "b"));
    let mut resolver = MapResolver { modules };

    let facade = SourceFacade;
    let mut compiler = Compiler::new(&facade);
    compiler.set_resolver(&mut resolver);
    compiler.set_base_uri("file:///a.xsl");
    let xml = wrap(
        r#"<xsl:include href="b.xsl"/><xsl:template match="x"><a/></xsl:template>"#,
    );
    feed(&mut compiler, &xml).unwrap();
    let stylesheet = compiler.into_stylesheet().unwrap();

    assert_eq!(stylesheet.rules.len(), 2);
    assert_eq!(
        stylesheet.rules[0].precedence,
        stylesheet.rules[1].precedence
    );
}

#[test]
fn test_import_must_precede_other_declarations() {
    let error = compile(&wrap(
        r#"<xsl:template match="x"><a/></xsl:template><xsl:import href="b.xsl"/>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0010);
}

#[test]
fn test_circular_import_is_detected() {
    let mut modules = HashMap::new();
    modules.insert(
        "file:///a.xsl".to_string(),
        module(Some("a.xsl"), "a"),
    );
    let mut resolver = MapResolver { modules };

    let facade = SourceFacade;
    let mut compiler = Compiler::new(&facade);
    compiler.set_resolver(&mut resolver);
    compiler.set_base_uri("file:///root.xsl");
    let error = feed(&mut compiler, &module(Some("a.xsl"), "root")).unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0210);
}

#[test]
fn test_forward_compatible_fallback() {
    let warnings = Rc::new(RefCell::new(Vec::new()));
    let seen = warnings.clone();

    let facade = SourceFacade;
    let mut compiler = Compiler::new(&facade);
    compiler.set_warning_listener(move |warning| seen.borrow_mut().push(warning.clone()));
    let xml = format!(
        r#"<xsl:stylesheet version="99.0" xmlns:xsl="{}"><xsl:template match="/"><xsl:brand-new><xsl:fallback>ok</xsl:fallback></xsl:brand-new></xsl:template></xsl:stylesheet>"#,
        XSL
    );
    feed(&mut compiler, &xml).unwrap();
    let stylesheet = compiler.into_stylesheet().unwrap();

    match &first_body(&stylesheet)[0] {
        Instruction::Sequence { content, .. } => match &content[0] {
            Instruction::LiteralText { text } => assert_eq!(text, "ok"),
            other => panic!("unexpected fallback content {:?}", other),
        },
        other => panic!("unexpected body {:?}", other),
    }
    assert_eq!(warnings.borrow().len(), 1);
}

#[test]
fn test_unknown_instruction_without_forward_compatibility() {
    let error = compile(&wrap(
        r#"<xsl:template match="/"><xsl:brand-new/></xsl:template>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0010);
}

#[test]
fn test_union_pattern_becomes_two_rules() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template match="chapter | appendix[2]"><out/></xsl:template>"#,
    ))
    .unwrap();
    assert_eq!(stylesheet.rules.len(), 2);
    let mut priorities: Vec<f64> = stylesheet.rules.iter().map(|r| r.priority).collect();
    priorities.sort_by(f64::total_cmp);
    assert_eq!(priorities, vec![0.0, 0.5]);
    // both rules share the one template body
    assert_eq!(stylesheet.rules[0].template, stylesheet.rules[1].template);
    assert_eq!(stylesheet.templates.len(), 1);
}

#[test]
fn test_use_when_false_removes_subtree() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template use-when="false()" match="x"><a/></xsl:template><xsl:template match="y"><b/></xsl:template>"#,
    ))
    .unwrap();
    assert_eq!(stylesheet.rules.len(), 1);
    assert_eq!(body_element_name(&stylesheet, 0), "b");
}

#[test]
fn test_use_when_unevaluable_excludes_element() {
    // a path expression is beyond the static subset: the element is
    // excluded rather than rejected
    let stylesheet = compile(&wrap(
        r#"<xsl:template use-when="foo/bar" match="x"><a/></xsl:template>"#,
    ))
    .unwrap();
    assert!(stylesheet.rules.is_empty());
}

#[test]
fn test_use_when_syntax_error_is_fatal() {
    let error = compile(&wrap(
        r#"<xsl:template use-when="'unterminated" match="x"><a/></xsl:template>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0020);
}

#[test]
fn test_static_parameter_drives_use_when() {
    let stylesheet = compile(&wrap(
        r#"<xsl:param name="debug" static="yes" select="false()"/><xsl:template use-when="$debug" match="x"><a/></xsl:template><xsl:template use-when="not($debug)" match="y"><b/></xsl:template>"#,
    ))
    .unwrap();
    assert_eq!(stylesheet.rules.len(), 1);
    let global = &stylesheet.globals[0];
    assert!(global.static_);
    assert_eq!(global.static_value.as_deref(), Some("false"));
}

#[test]
fn test_shadow_attribute_displaces_static_attribute() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template match="/"><xsl:value-of select="'ignored'" _select="{'f'}oo"/></xsl:template>"#,
    ))
    .unwrap();
    match &first_body(&stylesheet)[0] {
        Instruction::ValueOf { select, .. } => {
            assert_eq!(select.as_ref().unwrap().source, "foo");
        }
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_unknown_attribute_is_rejected() {
    let error = compile(&wrap(r#"<xsl:template match="/" bogus="1"><a/></xsl:template>"#))
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0090);
}

#[test]
fn test_template_requires_match_or_name() {
    let error = compile(&wrap(r#"<xsl:template><a/></xsl:template>"#)).unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0500);
}

#[test]
fn test_priority_requires_match() {
    let error = compile(&wrap(r#"<xsl:template name="t" priority="1"><a/></xsl:template>"#))
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0500);
}

#[test]
fn test_choose_requires_a_when() {
    let error = compile(&wrap(
        r#"<xsl:template match="/"><xsl:choose><xsl:otherwise><a/></xsl:otherwise></xsl:choose></xsl:template>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0010);
}

#[test]
fn test_choose_compiles() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template match="/"><xsl:choose><xsl:when test="1"><a/></xsl:when><xsl:when test="2"><b/></xsl:when><xsl:otherwise><c/></xsl:otherwise></xsl:choose></xsl:template>"#,
    ))
    .unwrap();
    match &first_body(&stylesheet)[0] {
        Instruction::Choose { whens, otherwise } => {
            assert_eq!(whens.len(), 2);
            assert_eq!(whens[0].test.source, "1");
            assert!(otherwise.is_some());
        }
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_duplicate_global_variable() {
    let error = compile(&wrap(
        r#"<xsl:variable name="v" select="1"/><xsl:variable name="v" select="2"/>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0630);
}

#[test]
fn test_cyclic_global_variables() {
    let error = compile(&wrap(
        r#"<xsl:variable name="a" select="$b"/><xsl:variable name="b" select="$a"/>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTDE0640);
}

#[test]
fn test_globals_are_dependency_ordered() {
    let stylesheet = compile(&wrap(
        r#"<xsl:variable name="a" select="$b + 1"/><xsl:variable name="b" select="2"/>"#,
    ))
    .unwrap();
    let names: Vec<&str> = stylesheet
        .globals
        .iter()
        .map(|g| g.name.local())
        .collect();
    assert_eq!(names, vec!["b", "a"]);
}

#[test]
fn test_strip_space_with_empty_list() {
    let stylesheet = compile(&wrap(r#"<xsl:strip-space elements=""/>"#)).unwrap();
    assert!(stylesheet.space_rules.is_empty());
}

#[test]
fn test_strip_space_must_be_empty() {
    let error = compile(&wrap(r#"<xsl:strip-space elements="a">x</xsl:strip-space>"#))
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0260);
}

#[test]
fn test_space_rules_resolve_to_clark_names() {
    let xml = format!(
        r#"<xsl:stylesheet version="3.0" xmlns:xsl="{}" xmlns:p="http://example.com/p"><xsl:strip-space elements="p:a *"/><xsl:preserve-space elements="b"/></xsl:stylesheet>"#,
        XSL
    );
    let stylesheet = compile(&xml).unwrap();
    assert_eq!(stylesheet.space_rules.len(), 3);
    assert!(stylesheet.space_rules[0].strip);
    assert!(!stylesheet.space_rules[2].strip);
}

#[test]
fn test_decimal_format_character_clash() {
    let error = compile(&wrap(
        r#"<xsl:decimal-format decimal-separator="," grouping-separator=","/>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE1300);
}

#[test]
fn test_namespace_alias() {
    let xml = format!(
        r#"<xsl:stylesheet version="3.0" xmlns:xsl="{}" xmlns:a="http://a" xmlns:b="http://b"><xsl:namespace-alias stylesheet-prefix="a" result-prefix="b"/></xsl:stylesheet>"#,
        XSL
    );
    let stylesheet = compile(&xml).unwrap();
    let alias = &stylesheet.namespace_aliases["http://a"];
    assert_eq!(alias.result_uri, "http://b");
}

#[test]
fn test_namespace_alias_requires_distinct_uris() {
    let xml = format!(
        r#"<xsl:stylesheet version="3.0" xmlns:xsl="{}" xmlns:a="http://a"><xsl:namespace-alias stylesheet-prefix="a" result-prefix="a"/></xsl:stylesheet>"#,
        XSL
    );
    let error = compile(&xml).unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0010);
}

#[test]
fn test_namespace_alias_default_maps_to_empty_uri() {
    let xml = format!(
        r##"<xsl:stylesheet version="3.0" xmlns:xsl="{}" xmlns:b="http://b"><xsl:namespace-alias stylesheet-prefix="#default" result-prefix="b"/></xsl:stylesheet>"##,
        XSL
    );
    let stylesheet = compile(&xml).unwrap();
    let alias = &stylesheet.namespace_aliases[""];
    assert_eq!(alias.result_uri, "http://b");
}

#[test]
fn test_text_value_template() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template match="/"><p xsl:expand-text="yes">total: {1 + 2}</p></xsl:template>"#,
    ))
    .unwrap();
    match &first_body(&stylesheet)[0] {
        Instruction::LiteralElement { content, .. } => match &content[0] {
            Instruction::TextValueTemplate { template } => {
                assert_eq!(template.fragments.len(), 2);
                match &template.fragments[1] {
                    Fragment::Expr(expr) => assert_eq!(expr.source, "1 + 2"),
                    other => panic!("unexpected fragment {:?}", other),
                }
            }
            other => panic!("unexpected content {:?}", other),
        },
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_plain_text_without_expand_text() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template match="/"><p>total: {not-an-expression}</p></xsl:template>"#,
    ))
    .unwrap();
    match &first_body(&stylesheet)[0] {
        Instruction::LiteralElement { content, .. } => match &content[0] {
            Instruction::LiteralText { text } => {
                assert_eq!(text, "total: {not-an-expression}")
            }
            other => panic!("unexpected content {:?}", other),
        },
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_attribute_value_template_on_literal_element() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template match="/"><a href="x{$u}y"/></xsl:template>"#,
    ))
    .unwrap();
    match &first_body(&stylesheet)[0] {
        Instruction::LiteralElement { attributes, .. } => {
            let (name, template) = &attributes[0];
            assert_eq!(name.local(), "href");
            assert_eq!(template.fragments.len(), 3);
            assert!(matches!(&template.fragments[0], Fragment::Literal(s) if s == "x"));
            assert!(matches!(&template.fragments[1], Fragment::Expr(e) if e.source == "$u"));
        }
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_unbalanced_avt_is_rejected() {
    let error = compile(&wrap(
        r#"<xsl:template match="/"><a href="x{y"/></xsl:template>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0350);
}

#[test]
fn test_lre_keeps_used_namespaces_and_drops_excluded() {
    let xml = format!(
        r#"<xsl:stylesheet version="3.0" xmlns:xsl="{}" xmlns:keep="http://keep" xmlns:drop="http://drop" exclude-result-prefixes="drop"><xsl:template match="/"><keep:x/></xsl:template></xsl:stylesheet>"#,
        XSL
    );
    let stylesheet = compile(&xml).unwrap();
    match &first_body(&stylesheet)[0] {
        Instruction::LiteralElement { namespaces, .. } => {
            assert!(namespaces.iter().any(|(p, _)| p == "keep"));
            assert!(namespaces.iter().all(|(p, _)| p != "drop"));
            assert!(namespaces.iter().all(|(_, uri)| uri != XSL));
        }
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_undeclared_exclusion_prefix() {
    let xml = format!(
        r#"<xsl:stylesheet version="3.0" xmlns:xsl="{}" exclude-result-prefixes="ghost"><xsl:template match="/"><a/></xsl:template></xsl:stylesheet>"#,
        XSL
    );
    let error = compile(&xml).unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0808);
}

#[test]
fn test_top_level_user_data_is_skipped() {
    let xml = format!(
        r#"<xsl:stylesheet version="3.0" xmlns:xsl="{}" xmlns:d="http://d"><d:config>ignored<d:inner/></d:config><xsl:template match="/"><a/></xsl:template></xsl:stylesheet>"#,
        XSL
    );
    let stylesheet = compile(&xml).unwrap();
    assert_eq!(stylesheet.rules.len(), 1);
    assert_eq!(first_body(&stylesheet).len(), 1);
}

#[test]
fn test_top_level_element_without_namespace() {
    let error = compile(&wrap(r#"<config/>"#)).unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0130);
}

#[test]
fn test_named_template_and_call() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template name="emit"><xsl:param name="p"/><out/></xsl:template><xsl:template match="/"><xsl:call-template name="emit"><xsl:with-param name="p" select="1"/></xsl:call-template></xsl:template>"#,
    ))
    .unwrap();
    let name = xsltc_name::Name::unprefixed("emit");
    let id = stylesheet.named_templates[&name];
    assert_eq!(stylesheet.templates[id].params.len(), 1);
    let caller = &stylesheet.templates[1].body[0];
    match caller {
        Instruction::CallTemplate { name, params } => {
            assert_eq!(name.local(), "emit");
            assert_eq!(params.len(), 1);
        }
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_duplicate_with_param() {
    let error = compile(&wrap(
        r#"<xsl:template match="/"><xsl:call-template name="t"><xsl:with-param name="p" select="1"/><xsl:with-param name="p" select="2"/></xsl:call-template></xsl:template>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0670);
}

#[test]
fn test_param_must_precede_body() {
    let error = compile(&wrap(
        r#"<xsl:template name="t"><out/><xsl:param name="p"/></xsl:template>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0010);
}

#[test]
fn test_key_declaration() {
    let stylesheet = compile(&wrap(r#"<xsl:key name="k" match="item" use="@id"/>"#)).unwrap();
    let name = xsltc_name::Name::unprefixed("k");
    assert_eq!(stylesheet.keys[&name].len(), 1);
    assert!(stylesheet.keys[&name][0].use_.is_some());
}

#[test]
fn test_key_requires_use_or_content() {
    let error = compile(&wrap(r#"<xsl:key name="k" match="item"/>"#)).unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0010);
}

#[test]
fn test_output_and_character_map() {
    let stylesheet = compile(&wrap(
        r#"<xsl:output method="xml" indent="yes" use-character-maps="m"/><xsl:character-map name="m"><xsl:output-character character="&amp;" string="&amp;amp;"/></xsl:character-map>"#,
    ))
    .unwrap();
    assert_eq!(stylesheet.outputs.len(), 1);
    let map = &stylesheet.character_maps[&xsltc_name::Name::unprefixed("m")];
    assert_eq!(map.characters, vec![('&', "&amp;".to_string())]);
}

#[test]
fn test_dangling_character_map_reference() {
    let error = compile(&wrap(r#"<xsl:output use-character-maps="ghost"/>"#)).unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE1660);
}

#[test]
fn test_dangling_attribute_set_reference() {
    let error = compile(&wrap(
        r#"<xsl:template match="/"><xsl:copy use-attribute-sets="ghost"/></xsl:template>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0710);
}

#[test]
fn test_attribute_set_chain() {
    let stylesheet = compile(&wrap(
        r#"<xsl:attribute-set name="base"><xsl:attribute name="class">x</xsl:attribute></xsl:attribute-set><xsl:attribute-set name="derived" use-attribute-sets="base"/>"#,
    ))
    .unwrap();
    assert_eq!(stylesheet.attribute_sets.len(), 2);
}

#[test]
fn test_attribute_set_rejects_other_content() {
    let error = compile(&wrap(
        r#"<xsl:attribute-set name="s"><xsl:value-of select="1"/></xsl:attribute-set>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0010);
}

#[test]
fn test_accumulator_and_mode() {
    let stylesheet = compile(&wrap(
        r#"<xsl:accumulator name="count" initial-value="0"><xsl:accumulator-rule match="item" select="$value + 1"/></xsl:accumulator><xsl:mode name="m" on-no-match="shallow-copy" streamable="no"/>"#,
    ))
    .unwrap();
    let accumulator = &stylesheet.accumulators[&xsltc_name::Name::unprefixed("count")];
    assert_eq!(accumulator.rules.len(), 1);
    let mode_name = ModeName::Named(xsltc_name::Name::unprefixed("m"));
    assert!(stylesheet.modes.contains_key(&mode_name));
}

#[test]
fn test_for_each_group_requires_one_grouping() {
    let error = compile(&wrap(
        r#"<xsl:template match="/"><xsl:for-each-group select="*" group-by="@a" group-adjacent="@b"><a/></xsl:for-each-group></xsl:template>"#,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE1080);
}

#[test]
fn test_mode_all_template_matches_everywhere() {
    let stylesheet = compile(&wrap(
        r##"<xsl:template match="x" mode="#all"><a/></xsl:template>"##,
    ))
    .unwrap();
    assert_eq!(stylesheet.rules[0].mode, ModeName::All);
    let mode = ModeName::Named(xsltc_name::Name::unprefixed("whatever"));
    assert_eq!(stylesheet.rules_for_mode(&mode).len(), 1);
}

#[test]
fn test_mode_list_rejects_all_with_others() {
    let error = compile(&wrap(
        r##"<xsl:template match="x" mode="#all m"><a/></xsl:template>"##,
    ))
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0550);
}

#[test]
fn test_xsl_text_preserves_whitespace() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template match="/"><xsl:text>  </xsl:text></xsl:template>"#,
    ))
    .unwrap();
    match &first_body(&stylesheet)[0] {
        Instruction::Text { text } => assert_eq!(text, "  "),
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_iterate_with_params_and_completion() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template match="/"><xsl:iterate select="*"><xsl:param name="n" select="0"/><xsl:on-completion select="$n"/><xsl:next-iteration><xsl:with-param name="n" select="$n + 1"/></xsl:next-iteration></xsl:iterate></xsl:template>"#,
    ))
    .unwrap();
    match &first_body(&stylesheet)[0] {
        Instruction::Iterate {
            params,
            on_completion,
            content,
            ..
        } => {
            assert_eq!(params.len(), 1);
            assert!(on_completion.is_some());
            assert!(matches!(
                content[0],
                Instruction::NextIteration { .. }
            ));
        }
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_try_catch() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template match="/"><xsl:try select="1"><xsl:catch errors="*"/></xsl:try></xsl:template>"#,
    ))
    .unwrap();
    match &first_body(&stylesheet)[0] {
        Instruction::Try { catches, .. } => assert_eq!(catches.len(), 1),
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_analyze_string() {
    let stylesheet = compile(&wrap(
        r#"<xsl:template match="/"><xsl:analyze-string select="." regex="a+"><xsl:matching-substring><m/></xsl:matching-substring><xsl:non-matching-substring><n/></xsl:non-matching-substring></xsl:analyze-string></xsl:template>"#,
    ))
    .unwrap();
    match &first_body(&stylesheet)[0] {
        Instruction::AnalyzeString {
            matching,
            non_matching,
            ..
        } => {
            assert!(matching.is_some());
            assert!(non_matching.is_some());
        }
        other => panic!("unexpected body {:?}", other),
    }
}

#[test]
fn test_function_declaration() {
    let xml = format!(
        r#"<xsl:stylesheet version="3.0" xmlns:xsl="{}" xmlns:f="http://f"><xsl:function name="f:double" as="xs:integer"><xsl:param name="n"/><xsl:sequence select="$n * 2"/></xsl:function></xsl:stylesheet>"#,
        XSL
    );
    let stylesheet = compile(&xml).unwrap();
    let name = xsltc_name::Name::uri_qualified("http://f", "double");
    assert!(stylesheet.function(&name, 1).is_some());
    assert!(stylesheet.function(&name, 2).is_none());
}

#[test]
fn test_function_requires_prefixed_name() {
    let error = compile(&wrap(r#"<xsl:function name="double"/>"#)).unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0010);
}

#[test]
fn test_version_must_be_decimal() {
    let error = compile(
        r#"<xsl:stylesheet version="one" xmlns:xsl="http://www.w3.org/1999/XSL/Transform"/>"#,
    )
    .unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0110);
}

#[test]
fn test_variable_rooted_pattern_rejected_in_20() {
    let xml = format!(
        r#"<xsl:stylesheet version="2.0" xmlns:xsl="{}"><xsl:variable name="v" select="()"/><xsl:template match="$v"><a/></xsl:template></xsl:stylesheet>"#,
        XSL
    );
    let error = compile(&xml).unwrap_err();
    assert_eq!(error.code, ErrorCode::XTSE0340);
}

#[test]
fn test_errors_carry_location() {
    let error = compile(&wrap(r#"<xsl:template><a/></xsl:template>"#)).unwrap_err();
    let location = error.location.expect("location recorded");
    assert_eq!(location.system_id.as_deref(), Some("file:///test.xsl"));
}
