//! The push-driven compiler: consumes XML parse events, maintains the
//! element-context stack and produces the compiled stylesheet.

use ahash::{HashMap, HashMapExt};
use rust_decimal::Decimal;

use xsltc_ast::instruction::{Instruction, ModeName, Validation};
use xsltc_ast::pattern::Pattern;
use xsltc_ast::stylesheet::{Stylesheet, Template, TemplateRule};
use xsltc_ast::value_template::{parse_value_template, RawFragment};
use xsltc_ast::{Error, ErrorCode, Result, SourceLocation};
use xsltc_name::{Name, Namespaces, XML_NAMESPACE, XSLT_NAMESPACE, XS_NAMESPACE};

use crate::attributes::{compile_text_template, parse_boolean, parse_validation};
use crate::context::{resolve_uri, ContextKind, ElementContext};
use crate::declarations::{compile_declaration, AcceptRule, ComponentKind, DeclScope};
use crate::event::ParseAttribute;
use crate::instructions::{compile_instruction, compile_literal_element};
use crate::linker::{PackageResolver, ResolveKind, SchemaParser, Session, StylesheetResolver};
use crate::names::{AttributeTable, XsltElement, STANDARD_ATTRIBUTES};
use crate::static_eval::{Atomic, StaticEvaluator};
use crate::stylesheet_builder::{StylesheetBuilder, PENDING_PRECEDENCE};
use crate::xpath::{StaticContext, XPathFacade};

enum SessionState<'a> {
    Owned(Session),
    Borrowed(&'a mut Session),
}

impl SessionState<'_> {
    fn get_mut(&mut self) -> &mut Session {
        match self {
            SessionState::Owned(session) => session,
            SessionState::Borrowed(session) => session,
        }
    }
}

/// One compiler instance services one parse-event stream. It runs to
/// completion or to the first unrecoverable error; warnings go to the
/// installed listener and compilation continues.
pub struct Compiler<'a, X: XPathFacade> {
    pub(crate) facade: &'a X,
    pub(crate) builder: StylesheetBuilder<X::Expr>,
    session: SessionState<'a>,
    resolver: Option<&'a mut dyn StylesheetResolver<X::Expr>>,
    package_resolver: Option<&'a mut dyn PackageResolver<X::Expr>>,
    schema_parser: Option<&'a mut dyn SchemaParser>,
    warning_listener: Option<Box<dyn FnMut(&Error) + 'a>>,
    attribute_table: Option<AttributeTable>,
    pub(crate) static_variables: HashMap<Name, Atomic>,
    pub(crate) static_parameters: HashMap<Name, Atomic>,
    pub(crate) pending_accepts: Vec<AcceptRule>,
    pub(crate) pending_overrides: Vec<(ComponentKind, Name)>,
    pub(crate) expose_rules: Vec<AcceptRule>,

    stack: Vec<ElementContext<X::Expr>>,
    pending_ns: Vec<(String, String)>,
    location: SourceLocation,
    initial_base_uri: Option<String>,
    excluded_uris: HashMap<String, u32>,
    extension_uris: HashMap<String, u32>,
    skip_depth: u32,
    user_data_depth: u32,
    schema_depth: u32,
    inline_schema_seen: bool,
    failed: Option<Error>,
}

impl<'a, X: XPathFacade> Compiler<'a, X> {
    pub fn new(facade: &'a X) -> Self {
        Self::build(facade, SessionState::Owned(Session::new()))
    }

    /// A compiler participating in a multi-module session; resolvers use
    /// this when loading imported or included modules.
    pub fn with_session(facade: &'a X, session: &'a mut Session) -> Self {
        Self::build(facade, SessionState::Borrowed(session))
    }

    fn build(facade: &'a X, session: SessionState<'a>) -> Self {
        Self {
            facade,
            builder: StylesheetBuilder::new(),
            session,
            resolver: None,
            package_resolver: None,
            schema_parser: None,
            warning_listener: None,
            attribute_table: Some(AttributeTable::builtin()),
            static_variables: HashMap::new(),
            static_parameters: HashMap::new(),
            pending_accepts: Vec::new(),
            pending_overrides: Vec::new(),
            expose_rules: Vec::new(),
            stack: Vec::new(),
            pending_ns: Vec::new(),
            location: SourceLocation::default(),
            initial_base_uri: None,
            excluded_uris: HashMap::new(),
            extension_uris: HashMap::new(),
            skip_depth: 0,
            user_data_depth: 0,
            schema_depth: 0,
            inline_schema_seen: false,
            failed: None,
        }
    }

    pub fn set_resolver(&mut self, resolver: &'a mut dyn StylesheetResolver<X::Expr>) {
        self.resolver = Some(resolver);
    }

    pub fn set_package_resolver(&mut self, resolver: &'a mut dyn PackageResolver<X::Expr>) {
        self.package_resolver = Some(resolver);
    }

    pub fn set_schema_parser(&mut self, parser: &'a mut dyn SchemaParser) {
        self.schema_parser = Some(parser);
    }

    pub fn set_warning_listener(&mut self, listener: impl FnMut(&Error) + 'a) {
        self.warning_listener = Some(Box::new(listener));
    }

    /// Without a table the XTSE0090 attribute check is disabled.
    pub fn set_attribute_table(&mut self, table: Option<AttributeTable>) {
        self.attribute_table = table;
    }

    pub fn set_static_parameters(&mut self, parameters: HashMap<Name, Atomic>) {
        self.static_parameters = parameters;
    }

    pub fn set_base_uri(&mut self, base_uri: &str) {
        self.initial_base_uri = Some(base_uri.to_string());
    }

    pub(crate) fn session(&mut self) -> &mut Session {
        self.session.get_mut()
    }

    pub(crate) fn take_inline_schema_seen(&mut self) -> bool {
        std::mem::take(&mut self.inline_schema_seen)
    }

    fn warn(&mut self, warning: Error) {
        if let Some(listener) = &mut self.warning_listener {
            listener(&warning);
        }
    }

    pub(crate) fn resolve_module(
        &mut self,
        href: &str,
        base: Option<&str>,
        kind: ResolveKind,
    ) -> Result<Stylesheet<X::Expr>> {
        let Some(resolver) = self.resolver.as_deref_mut() else {
            let code = match kind {
                ResolveKind::Import => ErrorCode::XTSE0210,
                ResolveKind::Include => ErrorCode::XTSE0180,
            };
            return Err(Error::new(
                code,
                format!("cannot load '{}': no stylesheet resolver is installed", href),
            ));
        };
        let session = self.session.get_mut();
        session.begin_loading(href, kind)?;
        let result = resolver.resolve(href, base, kind, session);
        self.session.get_mut().finish_loading(href);
        result
    }

    pub(crate) fn resolve_package(
        &mut self,
        name: &str,
        version: Option<&str>,
        base: Option<&str>,
    ) -> Result<Stylesheet<X::Expr>> {
        let Some(resolver) = self.package_resolver.as_deref_mut() else {
            return Err(Error::new(
                ErrorCode::XTSE3000,
                format!("cannot resolve package '{}': no package resolver", name),
            ));
        };
        let key = format!("package:{}", name);
        let session = self.session.get_mut();
        session.begin_loading(&key, ResolveKind::Import)?;
        let result = resolver.resolve(name, version, base, session);
        self.session.get_mut().finish_loading(&key);
        result
    }

    // ---- events -----------------------------------------------------

    pub fn set_locator(&mut self, system_id: Option<&str>, line: u32, column: u32) {
        self.location = SourceLocation::new(system_id.map(|s| s.to_string()), line, column);
        if self.initial_base_uri.is_none() {
            self.initial_base_uri = system_id.map(|s| s.to_string());
        }
    }

    pub fn start_document(&mut self) -> Result<()> {
        self.check_poisoned()?;
        Ok(())
    }

    pub fn end_document(&mut self) -> Result<()> {
        self.check_poisoned()?;
        if !self.stack.is_empty() {
            return self.fail(Error::new(
                ErrorCode::XTSE0010,
                "unbalanced element events",
            ));
        }
        Ok(())
    }

    pub fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        self.pending_ns.push((prefix.to_string(), uri.to_string()));
    }

    /// Scope restoration happens when the element context pops, so the
    /// end event carries no information for us.
    pub fn end_prefix_mapping(&mut self, _prefix: &str) {}

    pub fn characters(&mut self, text: &str) -> Result<()> {
        self.check_poisoned()?;
        if self.skip_depth > 0 || self.user_data_depth > 0 {
            return Ok(());
        }
        if self.schema_depth > 0 {
            if let Some(parser) = self.schema_parser.as_deref_mut() {
                let result = parser.characters(text);
                return self.check(result);
            }
            return Ok(());
        }
        match self.stack.last_mut() {
            Some(top) => {
                top.text.push_str(text);
                Ok(())
            }
            None => {
                if text.trim().is_empty() {
                    Ok(())
                } else {
                    self.fail(Error::new(
                        ErrorCode::XTSE0120,
                        "text is not allowed outside the stylesheet element",
                    ))
                }
            }
        }
    }

    pub fn start_element(
        &mut self,
        uri: &str,
        local: &str,
        qname: &str,
        attributes: &[ParseAttribute],
    ) -> Result<()> {
        self.check_poisoned()?;
        let result = self.start_element_inner(uri, local, qname, attributes);
        self.check(result)
    }

    pub fn end_element(&mut self, uri: &str, local: &str, qname: &str) -> Result<()> {
        self.check_poisoned()?;
        let result = self.end_element_inner(uri, local, qname);
        self.check(result)
    }

    /// The terminal call: assigns this module's import precedence and
    /// seals the builder.
    pub fn into_stylesheet(mut self) -> Result<Stylesheet<X::Expr>> {
        self.check_poisoned()?;
        let precedence = self.session.get_mut().next_precedence();
        self.seal(precedence)
    }

    /// Seal an included module: its declarations keep the pending
    /// precedence for the including module's seal to patch in.
    pub fn into_included_stylesheet(mut self) -> Result<Stylesheet<X::Expr>> {
        self.check_poisoned()?;
        self.seal(PENDING_PRECEDENCE)
    }

    fn seal(mut self, precedence: u32) -> Result<Stylesheet<X::Expr>> {
        let expose_rules = std::mem::take(&mut self.expose_rules);
        self.builder.apply_expose(&expose_rules);
        self.builder.seal(precedence)
    }

    // ---- internals --------------------------------------------------

    fn check_poisoned(&self) -> Result<()> {
        match &self.failed {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn fail<T>(&mut self, error: Error) -> Result<T> {
        let error = error.at(&self.location);
        self.failed = Some(error.clone());
        Err(error)
    }

    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(error) => self.fail(error),
        }
    }

    fn top_kind(&self) -> Option<ContextKind> {
        self.stack.last().map(|ctx| ctx.kind)
    }

    fn start_element_inner(
        &mut self,
        uri: &str,
        local: &str,
        qname: &str,
        raw_attributes: &[ParseAttribute],
    ) -> Result<()> {
        self.flush_text()?;

        if self.skip_depth > 0 {
            self.skip_depth += 1;
            self.pending_ns.clear();
            return Ok(());
        }
        if self.user_data_depth > 0 {
            self.user_data_depth += 1;
            self.pending_ns.clear();
            return Ok(());
        }
        if self.schema_depth > 0 {
            self.schema_depth += 1;
            self.pending_ns.clear();
            if let Some(parser) = self.schema_parser.as_deref_mut() {
                parser.start_element(uri, local, raw_attributes)?;
            }
            return Ok(());
        }
        if uri == XS_NAMESPACE
            && local == "schema"
            && matches!(
                self.top_kind(),
                Some(ContextKind::Xslt(XsltElement::ImportSchema))
            )
        {
            self.schema_depth = 1;
            self.inline_schema_seen = true;
            self.pending_ns.clear();
            if let Some(parser) = self.schema_parser.as_deref_mut() {
                parser.start_element(uri, local, raw_attributes)?;
            }
            return Ok(());
        }

        // in-scope bindings: the parent's, extended by the mappings
        // buffered since the previous element event
        let mut bindings = match self.stack.last() {
            Some(parent) => parent.bindings.clone(),
            None => Namespaces::default(),
        };
        for (prefix, ns_uri) in std::mem::take(&mut self.pending_ns) {
            bindings.declare(&prefix, &ns_uri);
        }

        if self.stack.is_empty()
            && matches!(local, "stylesheet" | "transform" | "package")
            && uri != XSLT_NAMESPACE
        {
            return Err(Error::new(
                ErrorCode::XTSE0150,
                format!("the document element {} is not in the XSLT namespace", qname),
            ));
        }

        let kind = self.classify(uri, local)?;
        if kind.is_none() {
            // suppressed (top-level user data)
            return Ok(());
        }
        let kind = kind.expect("checked above");

        let parent = self.stack.last();
        let parent_base = parent
            .map(|p| p.base_uri.clone())
            .unwrap_or_else(|| self.initial_base_uri.clone());
        let is_xslt_element = !matches!(kind, ContextKind::Literal);

        // fold shadow attributes before anything reads the map
        let attributes = self.resolve_shadow_attributes(
            raw_attributes,
            is_xslt_element,
            &bindings,
            parent_base.as_deref(),
        )?;

        let find = |want_uri: &str, name: &str| {
            attributes
                .iter()
                .find(|a| a.uri == want_uri && a.local == name)
                .map(|a| a.value.as_str())
        };
        let standard_ns = if is_xslt_element { "" } else { XSLT_NAMESPACE };
        let standard = |name: &str| find(standard_ns, name);

        // the fixed standard attributes may not be value templates
        for name in STANDARD_ATTRIBUTES {
            if let Some(value) = standard(name) {
                if parse_value_template(value)
                    .map(|fragments| {
                        fragments
                            .iter()
                            .any(|f| matches!(f, RawFragment::Expr { .. }))
                    })
                    .unwrap_or(true)
                {
                    return Err(Error::new(
                        ErrorCode::XTSE0020,
                        format!("the {} attribute must not be a value template", name),
                    ));
                }
            }
        }

        // effective base URI before use-when, which may call
        // static-base-uri()
        let base_uri = match attributes
            .iter()
            .find(|a| a.uri == XML_NAMESPACE && a.local == "base")
        {
            Some(attribute) => Some(resolve_uri(parent_base.as_deref(), &attribute.value)),
            None => parent_base.clone(),
        };

        if let Some(expression) = standard("use-when") {
            let evaluator =
                StaticEvaluator::new(&self.static_variables, &bindings, base_uri.as_deref());
            match evaluator.evaluate_boolean(expression) {
                Ok(true) => {}
                Ok(false) => {
                    self.skip_depth = 1;
                    return Ok(());
                }
                Err(error) if error.is_syntax() => {
                    return Err(Error::new(
                        ErrorCode::XTSE0020,
                        format!("invalid use-when expression: {}", error),
                    ));
                }
                // unevaluable: the element does not take part
                Err(_) => {
                    self.skip_depth = 1;
                    return Ok(());
                }
            }
        }

        if let (Some(table), ContextKind::Root(element) | ContextKind::Xslt(element)) =
            (&self.attribute_table, kind)
        {
            for attribute in &attributes {
                if attribute.uri.is_empty() && !table.is_allowed(element, &attribute.local) {
                    return Err(Error::new(
                        ErrorCode::XTSE0090,
                        format!(
                            "attribute '{}' is not allowed on xsl:{}",
                            attribute.local, element
                        ),
                    ));
                }
            }
        }

        // inherited standard attributes
        let version = match standard("version") {
            Some(value) => value.trim().parse::<Decimal>().map_err(|_| {
                Error::new(
                    ErrorCode::XTSE0110,
                    format!("version must be a decimal number, got '{}'", value),
                )
            })?,
            None => match parent {
                Some(parent) => parent.version,
                None => {
                    if matches!(kind, ContextKind::Root(_)) {
                        return Err(Error::new(
                            ErrorCode::XTSE0110,
                            "the stylesheet element requires a version attribute",
                        ));
                    }
                    xsltc_ast::instruction::xslt_30()
                }
            },
        };
        let expand_text = match standard("expand-text") {
            Some(value) => parse_boolean("expand-text", value)?,
            None => parent.map(|p| p.expand_text).unwrap_or(false),
        };
        let xpath_default_namespace = match standard("xpath-default-namespace") {
            Some(value) => value.to_string(),
            None => parent
                .map(|p| p.xpath_default_namespace.clone())
                .unwrap_or_default(),
        };
        let default_collation = match standard("default-collation") {
            Some(value) => Some(value.to_string()),
            None => parent.and_then(|p| p.default_collation.clone()),
        };
        let default_validation = match standard("default-validation") {
            Some(value) => parse_validation(value)?,
            None => parent
                .map(|p| p.default_validation)
                .unwrap_or(Validation::Strip),
        };
        let default_mode = match standard("default-mode") {
            Some("#unnamed") | None => parent
                .map(|p| p.default_mode.clone())
                .unwrap_or(ModeName::Unnamed),
            Some(value) => ModeName::Named(Name::parse_eqname(value, &bindings).ok_or_else(
                || {
                    Error::new(
                        ErrorCode::XTSE0280,
                        format!("undeclared namespace prefix in '{}'", value),
                    )
                },
            )?),
        };
        let xml_space_preserve = match attributes
            .iter()
            .find(|a| a.uri == XML_NAMESPACE && a.local == "space")
        {
            Some(attribute) => attribute.value == "preserve",
            None => parent.map(|p| p.xml_space_preserve).unwrap_or(false),
        };

        // prefix exclusions are scoped to this element's subtree
        let excluded_here =
            self.collect_prefix_uris(standard("exclude-result-prefixes"), &bindings)?;
        let extension_here =
            self.collect_prefix_uris(standard("extension-element-prefixes"), &bindings)?;
        for excluded in &excluded_here {
            *self.excluded_uris.entry(excluded.clone()).or_insert(0) += 1;
        }
        for extension in &extension_here {
            *self.extension_uris.entry(extension.clone()).or_insert(0) += 1;
        }

        let name = Name::new(
            local.to_string(),
            if uri.is_empty() {
                None
            } else {
                Some(uri.to_string())
            },
            qname.split_once(':').map(|(p, _)| p.to_string()),
        );

        if let ContextKind::Root(_) = kind {
            self.builder.version = version;
            self.builder.base_uri = base_uri.clone();
            self.builder.namespaces = bindings.clone();
            self.builder.default_validation = default_validation;
            self.builder.default_collation = default_collation.clone();
            self.builder.default_mode = default_mode.clone();
        }
        if kind == ContextKind::Literal && self.stack.is_empty() {
            // a simplified stylesheet root must carry xsl:version
            if standard("version").is_none() {
                return Err(Error::new(
                    ErrorCode::XTSE0150,
                    "the document element is neither an XSLT stylesheet nor a literal result element with xsl:version",
                ));
            }
            self.builder.version = version;
            self.builder.base_uri = base_uri.clone();
            self.builder.namespaces = bindings.clone();
        }

        self.stack.push(ElementContext {
            kind,
            name,
            bindings,
            attributes,
            excluded_here,
            extension_here,
            base_uri,
            expand_text,
            version,
            xpath_default_namespace,
            default_collation,
            default_mode,
            default_validation,
            xml_space_preserve,
            location: self.location.clone(),
            children: Vec::new(),
            text: String::new(),
        });
        Ok(())
    }

    /// Decide what an element is; `None` means the element opens a
    /// suppressed subtree (top-level user data).
    fn classify(&mut self, uri: &str, local: &str) -> Result<Option<ContextKind>> {
        if uri == XSLT_NAMESPACE {
            return match XsltElement::lookup(local) {
                Some(element) if self.stack.is_empty() => {
                    if element.is_root() {
                        Ok(Some(ContextKind::Root(element)))
                    } else {
                        Err(Error::new(
                            ErrorCode::XTSE0150,
                            format!("xsl:{} cannot be the document element", element),
                        ))
                    }
                }
                Some(element) => Ok(Some(ContextKind::Xslt(element))),
                None => {
                    if self.stack.is_empty() {
                        return Err(Error::new(
                            ErrorCode::XTSE0150,
                            format!("unknown document element xsl:{}", local),
                        ));
                    }
                    let effective_version =
                        self.stack.last().map(|p| p.version).unwrap_or_default();
                    if effective_version > xsltc_ast::instruction::xslt_30() {
                        self.warn(Error::new(
                            ErrorCode::XTSE0010,
                            format!(
                                "unknown element xsl:{} processed in forwards-compatible mode",
                                local
                            ),
                        ));
                        Ok(Some(ContextKind::UnknownXslt))
                    } else {
                        Err(Error::new(
                            ErrorCode::XTSE0010,
                            format!("unknown XSLT element xsl:{}", local),
                        ))
                    }
                }
            };
        }
        // not in the XSLT namespace
        if self.stack.is_empty() {
            return Ok(Some(ContextKind::Literal));
        }
        if self.stack.len() == 1 && matches!(self.top_kind(), Some(ContextKind::Root(_))) {
            // top-level user data
            if uri.is_empty() {
                return Err(Error::new(
                    ErrorCode::XTSE0130,
                    format!("top-level element '{}' must have a namespace", local),
                ));
            }
            self.user_data_depth = 1;
            return Ok(None);
        }
        Ok(Some(ContextKind::Literal))
    }

    /// Attributes whose local name starts with `_` are shadow
    /// attributes: their value is an AVT evaluated at compile time whose
    /// result displaces the plain attribute of the same name.
    fn resolve_shadow_attributes(
        &self,
        raw: &[ParseAttribute],
        is_xslt_element: bool,
        bindings: &Namespaces,
        base_uri: Option<&str>,
    ) -> Result<Vec<ParseAttribute>> {
        let shadow_ns = if is_xslt_element { "" } else { XSLT_NAMESPACE };
        let mut attributes: Vec<ParseAttribute> = Vec::new();
        let mut shadows: Vec<(&ParseAttribute, String)> = Vec::new();
        for attribute in raw {
            if attribute.uri == shadow_ns && attribute.local.starts_with('_') {
                let value =
                    self.evaluate_shadow(&attribute.value, bindings, base_uri)
                        .map_err(|message| {
                            Error::new(
                                ErrorCode::XTSE0020,
                                format!(
                                    "cannot evaluate shadow attribute {}: {}",
                                    attribute.local, message
                                ),
                            )
                        })?;
                shadows.push((attribute, value));
            } else {
                attributes.push(attribute.clone());
            }
        }
        for (shadow, value) in shadows {
            let local = shadow.local[1..].to_string();
            attributes.retain(|a| !(a.uri == shadow.uri && a.local == local));
            attributes.push(ParseAttribute {
                uri: shadow.uri.clone(),
                local,
                prefix: shadow.prefix.clone(),
                value,
            });
        }
        Ok(attributes)
    }

    fn evaluate_shadow(
        &self,
        raw: &str,
        bindings: &Namespaces,
        base_uri: Option<&str>,
    ) -> std::result::Result<String, String> {
        let fragments = parse_value_template(raw).map_err(|e| e.to_string())?;
        let evaluator = StaticEvaluator::new(&self.static_variables, bindings, base_uri);
        let mut out = String::new();
        for fragment in fragments {
            match fragment {
                RawFragment::Literal(text) => out.push_str(&text),
                RawFragment::Expr { source, .. } => {
                    let value = evaluator.evaluate(&source).map_err(|e| e.to_string())?;
                    out.push_str(&value.string_value());
                }
            }
        }
        Ok(out)
    }

    fn collect_prefix_uris(
        &self,
        value: Option<&str>,
        bindings: &Namespaces,
    ) -> Result<Vec<String>> {
        let Some(value) = value else {
            return Ok(Vec::new());
        };
        let mut uris = Vec::new();
        for token in value.split_whitespace() {
            if token == "#all" {
                for (_, uri) in bindings.prefixes() {
                    uris.push(uri.to_string());
                }
                let default_ns = bindings.default_element_namespace();
                if !default_ns.is_empty() {
                    uris.push(default_ns.to_string());
                }
            } else {
                uris.push(crate::attributes::resolve_exclusion_prefix(
                    bindings, token,
                )?);
            }
        }
        Ok(uris)
    }

    fn flush_text(&mut self) -> Result<()> {
        let Some(top) = self.stack.last_mut() else {
            return Ok(());
        };
        if top.text.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut top.text);
        let whitespace_only = text.chars().all(char::is_whitespace);
        match top.kind {
            ContextKind::Root(_) => {
                if !whitespace_only {
                    return Err(Error::new(
                        ErrorCode::XTSE0010,
                        "text is not allowed directly within the stylesheet element",
                    ));
                }
            }
            ContextKind::Xslt(XsltElement::Text) => {
                top.children.push(Instruction::LiteralText { text });
            }
            ContextKind::Literal if top.expand_text => {
                if whitespace_only && !top.xml_space_preserve {
                    return Ok(());
                }
                let static_ctx = StaticContext {
                    namespaces: top.bindings.clone(),
                    default_element_namespace: top.xpath_default_namespace.clone(),
                    base_uri: top.base_uri.clone(),
                    variable_names: Vec::new(),
                };
                let template = compile_text_template(self.facade, &static_ctx, &text)?;
                if template.as_literal().is_some() {
                    top.children.push(Instruction::LiteralText { text });
                } else {
                    top.children
                        .push(Instruction::TextValueTemplate { template });
                }
            }
            _ => {
                if whitespace_only && !top.xml_space_preserve {
                    return Ok(());
                }
                top.children.push(Instruction::LiteralText { text });
            }
        }
        Ok(())
    }

    fn end_element_inner(&mut self, uri: &str, local: &str, _qname: &str) -> Result<()> {
        self.flush_text()?;

        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(());
        }
        if self.user_data_depth > 0 {
            self.user_data_depth -= 1;
            return Ok(());
        }
        if self.schema_depth > 0 {
            self.schema_depth -= 1;
            if let Some(parser) = self.schema_parser.as_deref_mut() {
                parser.end_element(uri, local)?;
                if self.schema_depth == 0 {
                    parser.finish()?;
                }
            }
            return Ok(());
        }

        let ctx = self
            .stack
            .pop()
            .ok_or_else(|| Error::new(ErrorCode::XTSE0010, "unbalanced end-element event"))?;
        for excluded in &ctx.excluded_here {
            if let Some(count) = self.excluded_uris.get_mut(excluded) {
                *count = count.saturating_sub(1);
            }
        }
        for extension in &ctx.extension_here {
            if let Some(count) = self.extension_uris.get_mut(extension) {
                *count = count.saturating_sub(1);
            }
        }

        let location = ctx.location.clone();
        let result = self.dispatch(ctx);
        result.map_err(|error| error.at(&location))
    }

    fn dispatch(&mut self, ctx: ElementContext<X::Expr>) -> Result<()> {
        match ctx.kind {
            ContextKind::Root(_) => Ok(()),
            ContextKind::Literal => {
                if self.stack.is_empty() {
                    self.finish_simplified(ctx)
                } else {
                    let instruction = compile_literal_element(
                        self.facade,
                        ctx,
                        &self.excluded_uris,
                        &self.extension_uris,
                    )?;
                    self.note_attribute_set_refs(&instruction);
                    self.push_child(instruction)
                }
            }
            ContextKind::UnknownXslt => {
                // forwards compatibility: the element is replaced by the
                // content of its xsl:fallback children
                let mut content = Vec::new();
                for child in ctx.children {
                    if let Instruction::Fallback { content: inner } = child {
                        content.extend(inner);
                    }
                }
                let top_level = matches!(self.top_kind(), Some(ContextKind::Root(_)));
                if top_level {
                    // an unknown declaration is ignored entirely
                    Ok(())
                } else {
                    self.push_child(Instruction::Sequence {
                        select: None,
                        content,
                    })
                }
            }
            ContextKind::Xslt(element) => {
                if element.must_be_empty() {
                    let has_content = !ctx.text.trim().is_empty()
                        || ctx
                            .children
                            .iter()
                            .any(|child| !child.is_whitespace_text());
                    if has_content {
                        return Err(Error::new(
                            ErrorCode::XTSE0260,
                            format!("xsl:{} must be empty", element),
                        ));
                    }
                }
                match self.top_kind() {
                    Some(ContextKind::Root(_)) => {
                        compile_declaration(self, element, ctx, DeclScope::TopLevel)
                    }
                    Some(ContextKind::Xslt(XsltElement::UsePackage)) => {
                        compile_declaration(self, element, ctx, DeclScope::UsePackage)
                    }
                    Some(ContextKind::Xslt(XsltElement::Override)) => {
                        self.record_override(element, &ctx)?;
                        compile_declaration(self, element, ctx, DeclScope::Override)
                    }
                    _ => {
                        let instruction = compile_instruction(self.facade, element, ctx)?;
                        self.note_attribute_set_refs(&instruction);
                        self.push_child(instruction)
                    }
                }
            }
        }
    }

    /// A simplified stylesheet: the root literal result element becomes
    /// the body of a single `match="/"` template rule.
    fn finish_simplified(&mut self, ctx: ElementContext<X::Expr>) -> Result<()> {
        let instruction = compile_literal_element(
            self.facade,
            ctx,
            &self.excluded_uris,
            &self.extension_uris,
        )?;
        self.note_attribute_set_refs(&instruction);
        let id = self.builder.add_template(Template {
            name: None,
            modes: Vec::new(),
            params: Vec::new(),
            as_: None,
            visibility: Default::default(),
            precedence: PENDING_PRECEDENCE,
            body: vec![instruction],
        });
        let decl_index = self.session.get_mut().next_decl_index();
        self.builder.add_rule(TemplateRule {
            pattern: Pattern::Root,
            mode: ModeName::Unnamed,
            priority: 0.5,
            precedence: PENDING_PRECEDENCE,
            decl_index,
            template: id,
        });
        Ok(())
    }

    fn record_override(
        &mut self,
        element: XsltElement,
        ctx: &ElementContext<X::Expr>,
    ) -> Result<()> {
        let kind = match element {
            XsltElement::Template => ComponentKind::Template,
            XsltElement::Function => ComponentKind::Function,
            XsltElement::Variable | XsltElement::Param => ComponentKind::Variable,
            XsltElement::AttributeSet => ComponentKind::AttributeSet,
            XsltElement::Mode => ComponentKind::Mode,
            other => {
                return Err(Error::new(
                    ErrorCode::XTSE0010,
                    format!("xsl:{} cannot appear inside xsl:override", other),
                ))
            }
        };
        if let Some(value) = ctx.attribute("name") {
            if let Some(name) = Name::parse_eqname(value.trim(), &ctx.bindings) {
                self.pending_overrides.push((kind, name));
            }
        }
        Ok(())
    }

    fn note_attribute_set_refs(&mut self, instruction: &Instruction<X::Expr>) {
        let names = match instruction {
            Instruction::LiteralElement {
                use_attribute_sets, ..
            }
            | Instruction::Element {
                use_attribute_sets, ..
            }
            | Instruction::Copy {
                use_attribute_sets, ..
            } => use_attribute_sets,
            _ => return,
        };
        if !names.is_empty() {
            self.builder
                .note_attribute_set_refs(names, &self.location);
        }
    }

    fn push_child(&mut self, instruction: Instruction<X::Expr>) -> Result<()> {
        match self.stack.last_mut() {
            Some(parent) => {
                parent.children.push(instruction);
                Ok(())
            }
            None => Err(Error::new(
                ErrorCode::XTSE0010,
                "instructions are not allowed outside the stylesheet element",
            )),
        }
    }
}
