//! One compiler per XSLT instruction. Each consumes a popped element
//! context and produces the corresponding AST node; structural children
//! (xsl:when, xsl:sort, …) arrive as Item variants in the child list and
//! are folded into the parent's record here.

use ahash::{HashMap, HashSet, HashSetExt};

use xsltc_ast::instruction::{self as ast, Instruction};
use xsltc_ast::pattern::NameTest;
use xsltc_ast::{Error, ErrorCode, Result};
use xsltc_name::{Name, XML_NAMESPACE, XSLT_NAMESPACE};

use crate::attributes::Attributes;
use crate::context::ElementContext;
use crate::names::{XsltElement, OUTPUT_PROPERTIES};
use crate::xpath::XPathFacade;

pub(crate) fn compile_instruction<X: XPathFacade>(
    facade: &X,
    element: XsltElement,
    mut ctx: ElementContext<X::Expr>,
) -> Result<Instruction<X::Expr>> {
    let children = std::mem::take(&mut ctx.children);
    let a = Attributes::new(&ctx, facade);
    match element {
        XsltElement::AnalyzeString => {
            let select = a.xpath_required("select")?;
            let regex = a.avt_required("regex")?;
            let flags = a.avt("flags")?;
            let mut matching = None;
            let mut non_matching = None;
            for child in children {
                match child {
                    Instruction::MatchingSubstringItem { content } => {
                        if matching.is_some() || non_matching.is_some() {
                            return Err(structure("xsl:matching-substring out of order"));
                        }
                        matching = Some(content);
                    }
                    Instruction::NonMatchingSubstringItem { content } => {
                        if non_matching.is_some() {
                            return Err(structure(
                                "at most one xsl:non-matching-substring is allowed",
                            ));
                        }
                        non_matching = Some(content);
                    }
                    Instruction::Fallback { .. } => {}
                    other => return Err(unexpected_child("xsl:analyze-string", &other)),
                }
            }
            if matching.is_none() && non_matching.is_none() {
                return Err(structure(
                    "xsl:analyze-string requires xsl:matching-substring or xsl:non-matching-substring",
                ));
            }
            Ok(Instruction::AnalyzeString {
                select,
                regex,
                flags,
                matching,
                non_matching,
            })
        }
        XsltElement::ApplyImports => {
            let (params, _) = with_params("xsl:apply-imports", children, false)?;
            Ok(Instruction::ApplyImports { params })
        }
        XsltElement::ApplyTemplates => {
            let select = a.xpath("select")?;
            let mode = match a.string("mode").as_deref() {
                None | Some("#default") => ast::ModeRef::Default,
                Some("#current") => ast::ModeRef::Current,
                Some("#unnamed") => ast::ModeRef::Unnamed,
                Some(_) => ast::ModeRef::Named(a.eqname_required("mode")?),
            };
            let (params, sorts) = with_params("xsl:apply-templates", children, true)?;
            Ok(Instruction::ApplyTemplates {
                select,
                mode,
                sorts,
                params,
            })
        }
        XsltElement::Assert => Ok(Instruction::Assert {
            test: a.xpath_required("test")?,
            select: a.xpath("select")?,
            error_code: a.avt("error-code")?,
            content: plain_body(children)?,
        }),
        XsltElement::Attribute => {
            no_select_with_content(&a, &children, "xsl:attribute")?;
            Ok(Instruction::Attribute {
                name: a.avt_required("name")?,
                namespace: a.avt("namespace")?,
                select: a.xpath("select")?,
                separator: a.avt("separator")?,
                validation: a.validation("validation")?,
                type_: a.eqname("type")?,
                content: plain_body(children)?,
            })
        }
        XsltElement::Break => Ok(Instruction::Break {
            select: a.xpath("select")?,
            content: plain_body(children)?,
        }),
        XsltElement::CallTemplate => {
            let name = a.component_name("name")?;
            let (params, _) = with_params("xsl:call-template", children, false)?;
            Ok(Instruction::CallTemplate { name, params })
        }
        XsltElement::Choose => {
            let mut whens = Vec::new();
            let mut otherwise = None;
            for child in children {
                match child {
                    Instruction::WhenItem(when) => {
                        if otherwise.is_some() {
                            return Err(structure("xsl:when must precede xsl:otherwise"));
                        }
                        whens.push(when);
                    }
                    Instruction::OtherwiseItem { content } => {
                        if otherwise.is_some() {
                            return Err(structure("at most one xsl:otherwise is allowed"));
                        }
                        otherwise = Some(content);
                    }
                    other => return Err(unexpected_child("xsl:choose", &other)),
                }
            }
            if whens.is_empty() {
                return Err(structure("xsl:choose requires at least one xsl:when"));
            }
            Ok(Instruction::Choose { whens, otherwise })
        }
        XsltElement::Comment => {
            no_select_with_content(&a, &children, "xsl:comment")?;
            Ok(Instruction::Comment {
                select: a.xpath("select")?,
                content: plain_body(children)?,
            })
        }
        XsltElement::Copy => Ok(Instruction::Copy {
            select: a.xpath("select")?,
            copy_namespaces: a.boolean("copy-namespaces", true)?,
            inherit_namespaces: a.boolean("inherit-namespaces", true)?,
            use_attribute_sets: a.name_list("use-attribute-sets")?,
            validation: a.validation("validation")?,
            content: plain_body(children)?,
        }),
        XsltElement::CopyOf => Ok(Instruction::CopyOf {
            select: a.xpath_required("select")?,
            copy_namespaces: a.boolean("copy-namespaces", true)?,
            validation: a.validation("validation")?,
        }),
        XsltElement::Document => Ok(Instruction::Document {
            validation: a.validation("validation")?,
            content: plain_body(children)?,
        }),
        XsltElement::Element => Ok(Instruction::Element {
            name: a.avt_required("name")?,
            namespace: a.avt("namespace")?,
            inherit_namespaces: a.boolean("inherit-namespaces", true)?,
            use_attribute_sets: a.name_list("use-attribute-sets")?,
            validation: a.validation("validation")?,
            type_: a.eqname("type")?,
            content: plain_body(children)?,
        }),
        XsltElement::Evaluate => {
            let (with_params, _) = with_params("xsl:evaluate", children, false)?;
            Ok(Instruction::Evaluate {
                xpath: a.xpath_required("xpath")?,
                as_: a.string("as"),
                context_item: a.xpath("context-item")?,
                namespace_context: a.xpath("namespace-context")?,
                with_params,
            })
        }
        XsltElement::Fallback => Ok(Instruction::Fallback {
            content: plain_body(children)?,
        }),
        XsltElement::ForEach => {
            let select = a.xpath_required("select")?;
            let (sorts, body) = leading_sorts(children)?;
            Ok(Instruction::ForEach {
                select,
                sorts,
                content: body,
            })
        }
        XsltElement::ForEachGroup => {
            let select = a.xpath_required("select")?;
            let mut groupings = Vec::new();
            if let Some(expr) = a.xpath("group-by")? {
                groupings.push(ast::Grouping::By(expr));
            }
            if let Some(expr) = a.xpath("group-adjacent")? {
                groupings.push(ast::Grouping::Adjacent(expr));
            }
            if let Some(pattern) = a.pattern("group-starting-with")? {
                groupings.push(ast::Grouping::StartingWith(pattern));
            }
            if let Some(pattern) = a.pattern("group-ending-with")? {
                groupings.push(ast::Grouping::EndingWith(pattern));
            }
            if groupings.len() != 1 {
                return Err(Error::new(
                    ErrorCode::XTSE1080,
                    "xsl:for-each-group requires exactly one grouping attribute",
                ));
            }
            let grouping = groupings.pop().expect("checked above");
            let (sorts, body) = leading_sorts(children)?;
            Ok(Instruction::ForEachGroup {
                select,
                grouping,
                collation: a.avt("collation")?,
                sorts,
                content: body,
            })
        }
        XsltElement::Fork => Ok(Instruction::Fork {
            content: plain_body(children)?,
        }),
        XsltElement::If => Ok(Instruction::If {
            test: a.xpath_required("test")?,
            content: plain_body(children)?,
        }),
        XsltElement::Iterate => {
            let select = a.xpath_required("select")?;
            let (params, rest) = leading_params(children)?;
            let mut on_completion = None;
            let mut body = Vec::new();
            for child in rest {
                match child {
                    Instruction::OnCompletionItem { select, content } => {
                        if on_completion.is_some() || !body.is_empty() {
                            return Err(structure(
                                "xsl:on-completion must appear once, before the body",
                            ));
                        }
                        let mut completion = content;
                        if let Some(expr) = select {
                            completion.insert(
                                0,
                                Instruction::Sequence {
                                    select: Some(expr),
                                    content: vec![],
                                },
                            );
                        }
                        on_completion = Some(completion);
                    }
                    other => body.push(other),
                }
            }
            Ok(Instruction::Iterate {
                select,
                params,
                on_completion,
                content: plain_body(body)?,
            })
        }
        XsltElement::Map => Ok(Instruction::Map {
            content: plain_body(children)?,
        }),
        XsltElement::MapEntry => Ok(Instruction::MapEntry {
            key: a.xpath_required("key")?,
            select: a.xpath("select")?,
            content: plain_body(children)?,
        }),
        XsltElement::Merge => {
            let mut sources = Vec::new();
            let mut action = None;
            for child in children {
                match child {
                    Instruction::MergeSourceItem(source) => {
                        if action.is_some() {
                            return Err(structure(
                                "xsl:merge-source must precede xsl:merge-action",
                            ));
                        }
                        sources.push(source);
                    }
                    Instruction::MergeActionItem { content } => {
                        if action.is_some() {
                            return Err(structure("at most one xsl:merge-action is allowed"));
                        }
                        action = Some(content);
                    }
                    Instruction::Fallback { .. } => {}
                    other => return Err(unexpected_child("xsl:merge", &other)),
                }
            }
            if sources.is_empty() {
                return Err(structure("xsl:merge requires at least one xsl:merge-source"));
            }
            let action =
                action.ok_or_else(|| structure("xsl:merge requires an xsl:merge-action"))?;
            Ok(Instruction::Merge { sources, action })
        }
        XsltElement::MergeSource => {
            let mut keys = Vec::new();
            for child in children {
                match child {
                    Instruction::MergeKeyItem(sort) => keys.push(sort),
                    other => return Err(unexpected_child("xsl:merge-source", &other)),
                }
            }
            if keys.is_empty() {
                return Err(structure(
                    "xsl:merge-source requires at least one xsl:merge-key",
                ));
            }
            Ok(Instruction::MergeSourceItem(ast::MergeSource {
                name: a.string("name"),
                for_each_item: a.xpath("for-each-item")?,
                for_each_source: a.xpath("for-each-source")?,
                select: a.xpath_required("select")?,
                keys,
            }))
        }
        XsltElement::MergeAction => Ok(Instruction::MergeActionItem {
            content: plain_body(children)?,
        }),
        XsltElement::MergeKey => Ok(Instruction::MergeKeyItem(sort_from(&a, children)?)),
        XsltElement::Message => Ok(Instruction::Message {
            select: a.xpath("select")?,
            terminate: a.avt("terminate")?,
            error_code: a.avt("error-code")?,
            content: plain_body(children)?,
        }),
        XsltElement::Namespace => {
            no_select_with_content(&a, &children, "xsl:namespace")?;
            Ok(Instruction::Namespace {
                name: a.avt_required("name")?,
                select: a.xpath("select")?,
                content: plain_body(children)?,
            })
        }
        XsltElement::NextIteration => {
            let (params, _) = with_params("xsl:next-iteration", children, false)?;
            Ok(Instruction::NextIteration { params })
        }
        XsltElement::NextMatch => {
            let (params, _) = with_params("xsl:next-match", children, false)?;
            Ok(Instruction::NextMatch { params })
        }
        XsltElement::Number => {
            let value = a.xpath("value")?;
            if value.is_some()
                && (a.string("level").is_some()
                    || a.string("count").is_some()
                    || a.string("from").is_some())
            {
                return Err(Error::new(
                    ErrorCode::XTSE0975,
                    "the value attribute of xsl:number excludes level, count and from",
                ));
            }
            let level = match a.string("level").as_deref() {
                None | Some("single") => ast::NumberLevel::Single,
                Some("multiple") => ast::NumberLevel::Multiple,
                Some("any") => ast::NumberLevel::Any,
                Some(other) => {
                    return Err(Error::new(
                        ErrorCode::XTSE0020,
                        format!("invalid level '{}'", other),
                    ))
                }
            };
            Ok(Instruction::Number {
                value,
                select: a.xpath("select")?,
                level,
                count: a.pattern("count")?,
                from: a.pattern("from")?,
                format: a.avt("format")?,
                lang: a.avt("lang")?,
                grouping_separator: a.avt("grouping-separator")?,
                grouping_size: a.avt("grouping-size")?,
            })
        }
        XsltElement::OnCompletion => Ok(Instruction::OnCompletionItem {
            select: a.xpath("select")?,
            content: plain_body(children)?,
        }),
        XsltElement::OnEmpty => Ok(Instruction::OnEmpty {
            select: a.xpath("select")?,
            content: plain_body(children)?,
        }),
        XsltElement::OnNonEmpty => Ok(Instruction::OnNonEmpty {
            select: a.xpath("select")?,
            content: plain_body(children)?,
        }),
        XsltElement::PerformSort => {
            let select = a.xpath("select")?;
            let (sorts, body) = leading_sorts(children)?;
            if sorts.is_empty() {
                return Err(structure("xsl:perform-sort requires at least one xsl:sort"));
            }
            Ok(Instruction::PerformSort {
                select,
                sorts,
                content: body,
            })
        }
        XsltElement::ProcessingInstruction => {
            no_select_with_content(&a, &children, "xsl:processing-instruction")?;
            Ok(Instruction::ProcessingInstruction {
                name: a.avt_required("name")?,
                select: a.xpath("select")?,
                content: plain_body(children)?,
            })
        }
        XsltElement::ResultDocument => {
            let mut properties = Vec::new();
            for attribute in &ctx.attributes {
                if attribute.uri.is_empty()
                    && OUTPUT_PROPERTIES.contains(&attribute.local.as_str())
                {
                    let template = crate::attributes::compile_value_template(
                        facade,
                        &a.static_ctx,
                        &attribute.value,
                    )?;
                    properties.push((Name::unprefixed(&attribute.local), template));
                }
            }
            Ok(Instruction::ResultDocument {
                href: a.avt("href")?,
                format: a.avt("format")?,
                validation: a.validation("validation")?,
                properties,
                content: plain_body(children)?,
            })
        }
        XsltElement::Sequence => Ok(Instruction::Sequence {
            select: a.xpath("select")?,
            content: plain_body(children)?,
        }),
        XsltElement::SourceDocument => Ok(Instruction::SourceDocument {
            href: a.avt_required("href")?,
            streamable: a.boolean("streamable", false)?,
            validation: a.validation("validation")?,
            content: plain_body(children)?,
        }),
        XsltElement::Text => {
            let mut text = String::new();
            for child in children {
                match child {
                    Instruction::LiteralText { text: t } => text.push_str(&t),
                    other => return Err(unexpected_child("xsl:text", &other)),
                }
            }
            Ok(Instruction::Text { text })
        }
        XsltElement::Try => {
            let mut content = Vec::new();
            let mut catches = Vec::new();
            for child in children {
                match child {
                    Instruction::CatchItem(catch) => catches.push(catch),
                    other => {
                        if !catches.is_empty() {
                            return Err(structure("xsl:catch must follow the xsl:try body"));
                        }
                        content.push(other);
                    }
                }
            }
            if catches.is_empty() {
                return Err(structure("xsl:try requires at least one xsl:catch"));
            }
            Ok(Instruction::Try {
                select: a.xpath("select")?,
                rollback_output: a.boolean("rollback-output", true)?,
                content: plain_body(content)?,
                catches,
            })
        }
        XsltElement::Catch => Ok(Instruction::CatchItem(ast::Catch {
            errors: name_test_list(&a, "errors")?,
            select: a.xpath("select")?,
            content: plain_body(children)?,
        })),
        XsltElement::ValueOf => {
            no_select_with_content(&a, &children, "xsl:value-of")?;
            Ok(Instruction::ValueOf {
                select: a.xpath("select")?,
                separator: a.avt("separator")?,
                disable_output_escaping: a.boolean("disable-output-escaping", false)?,
                content: plain_body(children)?,
            })
        }
        XsltElement::Variable => {
            no_select_with_content(&a, &children, "xsl:variable")?;
            Ok(Instruction::Variable {
                name: a.component_name("name")?,
                select: a.xpath("select")?,
                as_: a.string("as"),
                content: plain_body(children)?,
            })
        }
        XsltElement::WherePopulated => Ok(Instruction::WherePopulated {
            content: plain_body(children)?,
        }),

        XsltElement::When => Ok(Instruction::WhenItem(ast::When {
            test: a.xpath_required("test")?,
            content: plain_body(children)?,
        })),
        XsltElement::Otherwise => Ok(Instruction::OtherwiseItem {
            content: plain_body(children)?,
        }),
        XsltElement::Sort => Ok(Instruction::SortItem(sort_from(&a, children)?)),
        XsltElement::WithParam => {
            no_select_with_content(&a, &children, "xsl:with-param")?;
            Ok(Instruction::WithParamItem(ast::WithParam {
                name: a.component_name("name")?,
                select: a.xpath("select")?,
                as_: a.string("as"),
                tunnel: a.boolean("tunnel", false)?,
                content: plain_body(children)?,
            }))
        }
        XsltElement::Param => {
            no_select_with_content(&a, &children, "xsl:param")?;
            let required = a.boolean("required", false)?;
            let select = a.xpath("select")?;
            if required && select.is_some() {
                return Err(structure(
                    "a required parameter cannot have a default value",
                ));
            }
            Ok(Instruction::ParamItem(ast::Param {
                name: a.component_name("name")?,
                select,
                as_: a.string("as"),
                required,
                tunnel: a.boolean("tunnel", false)?,
                content: plain_body(children)?,
            }))
        }
        XsltElement::MatchingSubstring => Ok(Instruction::MatchingSubstringItem {
            content: plain_body(children)?,
        }),
        XsltElement::NonMatchingSubstring => Ok(Instruction::NonMatchingSubstringItem {
            content: plain_body(children)?,
        }),
        XsltElement::ContextItem => {
            let use_ = match a.string("use").as_deref() {
                None | Some("optional") => ast::ContextItemUse::Optional,
                Some("required") => ast::ContextItemUse::Required,
                Some("absent") => ast::ContextItemUse::Absent,
                Some(other) => {
                    return Err(Error::new(
                        ErrorCode::XTSE0020,
                        format!("invalid use '{}'", other),
                    ))
                }
            };
            Ok(Instruction::ContextItemDecl {
                as_: a.string("as"),
                use_,
            })
        }
        XsltElement::OutputCharacter => {
            let character = a.required("character", |s| {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(Error::new(
                        ErrorCode::XTSE0020,
                        "character must be a single character",
                    )),
                }
            })?;
            Ok(Instruction::OutputCharacterItem {
                character,
                string: a.string_required("string")?,
            })
        }
        XsltElement::AccumulatorRule => {
            let phase = match a.string("phase").as_deref() {
                None | Some("start") => ast::AccumulatorPhase::Start,
                Some("end") => ast::AccumulatorPhase::End,
                Some(other) => {
                    return Err(Error::new(
                        ErrorCode::XTSE0020,
                        format!("invalid phase '{}'", other),
                    ))
                }
            };
            Ok(Instruction::AccumulatorRuleItem {
                match_: a.pattern_required("match")?,
                phase,
                select: a.xpath("select")?,
                content: plain_body(children)?,
            })
        }

        // declarations and root forms cannot appear in a sequence
        // constructor
        XsltElement::Accept
        | XsltElement::Accumulator
        | XsltElement::AttributeSet
        | XsltElement::CharacterMap
        | XsltElement::DecimalFormat
        | XsltElement::Expose
        | XsltElement::Function
        | XsltElement::GlobalContextItem
        | XsltElement::Import
        | XsltElement::ImportSchema
        | XsltElement::Include
        | XsltElement::Key
        | XsltElement::Mode
        | XsltElement::NamespaceAlias
        | XsltElement::Output
        | XsltElement::Override
        | XsltElement::Package
        | XsltElement::PreserveSpace
        | XsltElement::StripSpace
        | XsltElement::Stylesheet
        | XsltElement::Template
        | XsltElement::Transform
        | XsltElement::UsePackage => Err(Error::new(
            ErrorCode::XTSE0010,
            format!("xsl:{} is not allowed in a sequence constructor", element),
        )),
    }
}

/// A literal result element: attributes become AVTs, in-scope namespaces
/// are captured minus the XSLT namespace and the excluded and extension
/// URIs, except URIs the element or its attributes actually use.
pub(crate) fn compile_literal_element<X: XPathFacade>(
    facade: &X,
    mut ctx: ElementContext<X::Expr>,
    excluded: &HashMap<String, u32>,
    extensions: &HashMap<String, u32>,
) -> Result<Instruction<X::Expr>> {
    let children = std::mem::take(&mut ctx.children);
    let a = Attributes::new(&ctx, facade);

    let mut attributes = Vec::new();
    let mut used_uris: HashSet<&str> = HashSet::new();
    if let Some(uri) = ctx.name.namespace() {
        used_uris.insert(uri);
    }
    for attribute in &ctx.attributes {
        if attribute.uri == XSLT_NAMESPACE || attribute.uri == XML_NAMESPACE {
            continue;
        }
        if !attribute.uri.is_empty() {
            used_uris.insert(&attribute.uri);
        }
        let template =
            crate::attributes::compile_value_template(facade, &a.static_ctx, &attribute.value)?;
        attributes.push((attribute.name(), template));
    }

    let suppressed = |uri: &str| {
        uri == XSLT_NAMESPACE
            || excluded.get(uri).copied().unwrap_or(0) > 0
            || extensions.get(uri).copied().unwrap_or(0) > 0
    };
    let mut namespaces = Vec::new();
    for (prefix, uri) in ctx.bindings.prefixes() {
        if suppressed(uri) && !used_uris.contains(uri) {
            continue;
        }
        namespaces.push((prefix.to_string(), uri.to_string()));
    }
    let default_ns = ctx.bindings.default_element_namespace();
    if !default_ns.is_empty() && (!suppressed(default_ns) || used_uris.contains(default_ns)) {
        namespaces.push((String::new(), default_ns.to_string()));
    }
    namespaces.sort();

    // xsl:use-attribute-sets on a literal result element
    let use_attribute_sets = ctx
        .attributes
        .iter()
        .find(|attribute| {
            attribute.uri == XSLT_NAMESPACE && attribute.local == "use-attribute-sets"
        })
        .map(|attribute| {
            attribute
                .value
                .split_whitespace()
                .map(|token| {
                    Name::parse_eqname(token, &ctx.bindings).ok_or_else(|| {
                        Error::new(
                            ErrorCode::XTSE0280,
                            format!("undeclared namespace prefix in '{}'", token),
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?
        .unwrap_or_default();

    Ok(Instruction::LiteralElement {
        name: ctx.name.clone(),
        attributes,
        namespaces,
        use_attribute_sets,
        content: plain_body(children)?,
    })
}

pub(crate) fn structure(message: impl Into<String>) -> Error {
    Error::new(ErrorCode::XTSE0010, message)
}

fn unexpected_child<E>(parent: &str, _child: &Instruction<E>) -> Error {
    structure(format!("unexpected child element in {}", parent))
}

/// A finished sequence constructor: no structural items may remain.
pub(crate) fn plain_body<E>(children: Vec<Instruction<E>>) -> Result<Vec<Instruction<E>>> {
    if let Some(stray) = children.iter().find(|child| child.is_structural()) {
        return Err(unexpected_child("this element", stray));
    }
    Ok(children)
}

/// Leading xsl:param children; one appearing after other content is an
/// error, as is a duplicate name.
pub(crate) fn leading_params<E>(
    children: Vec<Instruction<E>>,
) -> Result<(Vec<ast::Param<E>>, Vec<Instruction<E>>)> {
    let mut params = Vec::new();
    let mut rest = Vec::new();
    let mut names = HashSet::new();
    for child in children {
        match child {
            Instruction::ParamItem(param) => {
                if !rest.is_empty() {
                    return Err(structure("xsl:param must precede all other content"));
                }
                if !names.insert(param.name.clone()) {
                    return Err(Error::new(
                        ErrorCode::XTSE0670,
                        format!("duplicate parameter '{}'", param.name.to_clark()),
                    ));
                }
                params.push(param);
            }
            other => rest.push(other),
        }
    }
    Ok((params, rest))
}

/// Leading xsl:sort children; one appearing after the body began is an
/// error.
fn leading_sorts<E>(
    children: Vec<Instruction<E>>,
) -> Result<(Vec<ast::Sort<E>>, Vec<Instruction<E>>)> {
    let mut sorts = Vec::new();
    let mut rest = Vec::new();
    for child in children {
        match child {
            Instruction::SortItem(sort) => {
                if !rest.is_empty() {
                    return Err(structure("xsl:sort must precede the body"));
                }
                sorts.push(sort);
            }
            other => rest.push(other),
        }
    }
    let rest = plain_body(rest)?;
    Ok((sorts, rest))
}

/// For elements whose content is restricted to xsl:with-param (and
/// optionally xsl:sort, which must come first).
fn with_params<E>(
    parent: &str,
    children: Vec<Instruction<E>>,
    allow_sorts: bool,
) -> Result<(Vec<ast::WithParam<E>>, Vec<ast::Sort<E>>)> {
    let mut params = Vec::new();
    let mut sorts = Vec::new();
    let mut names = HashSet::new();
    for child in children {
        match child {
            Instruction::WithParamItem(param) => {
                if !names.insert(param.name.clone()) {
                    return Err(Error::new(
                        ErrorCode::XTSE0670,
                        format!("duplicate parameter '{}'", param.name.to_clark()),
                    ));
                }
                params.push(param);
            }
            Instruction::SortItem(sort) if allow_sorts => {
                if !params.is_empty() {
                    return Err(structure("xsl:sort must precede xsl:with-param"));
                }
                sorts.push(sort);
            }
            Instruction::Fallback { .. } => {}
            other => return Err(unexpected_child(parent, &other)),
        }
    }
    Ok((params, sorts))
}

fn sort_from<X: XPathFacade>(
    a: &Attributes<X>,
    children: Vec<Instruction<X::Expr>>,
) -> Result<ast::Sort<X::Expr>> {
    let select = a.xpath("select")?;
    let content = plain_body(children)?;
    if select.is_some() && !content.iter().all(|c| c.is_whitespace_text()) {
        return Err(structure("xsl:sort cannot have both select and content"));
    }
    Ok(ast::Sort {
        select,
        lang: a.avt("lang")?,
        order: a.avt("order")?,
        collation: a.avt("collation")?,
        stable: a.avt("stable")?,
        case_order: a.avt("case-order")?,
        data_type: a.avt("data-type")?,
        content,
    })
}

/// Error name tests for xsl:catch: `*`, `prefix:*`, `*:local` or QNames.
fn name_test_list<X: XPathFacade>(a: &Attributes<X>, attribute: &str) -> Result<Vec<NameTest>> {
    let Some(value) = a.ctx.attribute(attribute) else {
        return Ok(Vec::new());
    };
    let mut tests = Vec::new();
    for token in value.split_whitespace() {
        tests.push(parse_name_test(a, token)?);
    }
    Ok(tests)
}

pub(crate) fn parse_name_test<X: XPathFacade>(
    a: &Attributes<X>,
    token: &str,
) -> Result<NameTest> {
    if token == "*" {
        return Ok(NameTest::Star);
    }
    if let Some(prefix) = token.strip_suffix(":*") {
        let uri = a.ctx.bindings.by_prefix(prefix).ok_or_else(|| {
            Error::new(
                ErrorCode::XTSE0280,
                format!("undeclared namespace prefix '{}'", prefix),
            )
        })?;
        return Ok(NameTest::NamespaceStar(uri.to_string()));
    }
    if let Some(local) = token.strip_prefix("*:") {
        return Ok(NameTest::LocalStar(local.to_string()));
    }
    let name = Name::parse_eqname(token, &a.ctx.bindings).ok_or_else(|| {
        Error::new(
            ErrorCode::XTSE0280,
            format!("undeclared namespace prefix in '{}'", token),
        )
    })?;
    Ok(NameTest::Name(name))
}

/// select together with a non-empty sequence constructor is not allowed.
fn no_select_with_content<X: XPathFacade>(
    a: &Attributes<X>,
    children: &[Instruction<X::Expr>],
    name: &str,
) -> Result<()> {
    if a.ctx.attribute("select").is_some()
        && children.iter().any(|child| !child.is_whitespace_text())
    {
        return Err(structure(format!(
            "{} cannot have both a select attribute and content",
            name
        )));
    }
    Ok(())
}
