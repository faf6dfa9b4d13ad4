use xsltc_ast::{Error, ErrorCode, Result};
use xsltc_name::{Name, Namespaces};

/// The static context an embedded expression is compiled against: the
/// in-scope namespace bindings of its carrying element, the effective
/// xpath-default-namespace, the effective base URI and the names of the
/// in-scope variables.
#[derive(Debug, Clone)]
pub struct StaticContext {
    pub namespaces: Namespaces,
    pub default_element_namespace: String,
    pub base_uri: Option<String>,
    pub variable_names: Vec<Name>,
}

impl StaticContext {
    pub fn new(namespaces: Namespaces) -> Self {
        Self {
            namespaces,
            default_element_namespace: String::new(),
            base_uri: None,
            variable_names: Vec::new(),
        }
    }
}

/// The seam onto the external XPath compiler. Implementations parse a
/// source string into whatever evaluable representation the runtime
/// understands; this crate only stores the result.
pub trait XPathFacade {
    type Expr: Clone + std::fmt::Debug + PartialEq;

    fn compile(&self, source: &str, ctx: &StaticContext) -> Result<Self::Expr>;

    /// Predicates inside match patterns; a facade may apply different
    /// restrictions there.
    fn compile_pattern_predicate(&self, source: &str, ctx: &StaticContext) -> Result<Self::Expr> {
        self.compile(source, ctx)
    }

    /// The global variables an expression references, for the seal-time
    /// dependency ordering of global declarations.
    fn variable_references(&self, expr: &Self::Expr) -> Vec<Name>;
}

/// A facade that retains the expression source and its static-context
/// snapshot, letting the front end run without an XPath engine. Variable
/// references are recovered by a lexical scan.
#[derive(Debug, Clone, Default)]
pub struct SourceFacade;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SourceExpr {
    pub source: String,
    pub default_element_namespace: String,
    pub base_uri: Option<String>,
}

impl XPathFacade for SourceFacade {
    type Expr = SourceExpr;

    fn compile(&self, source: &str, ctx: &StaticContext) -> Result<SourceExpr> {
        if source.trim().is_empty() {
            return Err(Error::new(ErrorCode::XPST0003, "empty expression"));
        }
        Ok(SourceExpr {
            source: source.to_string(),
            default_element_namespace: ctx.default_element_namespace.clone(),
            base_uri: ctx.base_uri.clone(),
        })
    }

    fn variable_references(&self, expr: &SourceExpr) -> Vec<Name> {
        scan_variable_references(&expr.source)
    }
}

/// Collect `$name` references, skipping string literals and comments.
/// A lexical approximation; a real facade reports these from its AST.
pub fn scan_variable_references(source: &str) -> Vec<Name> {
    let mut names = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        match c {
            '\'' | '"' => {
                for (_, d) in chars.by_ref() {
                    if d == c {
                        break;
                    }
                }
            }
            '(' => {
                if matches!(chars.peek(), Some((_, ':'))) {
                    let mut depth = 1;
                    chars.next();
                    while depth > 0 {
                        match chars.next() {
                            Some((_, '(')) if matches!(chars.peek(), Some((_, ':'))) => {
                                chars.next();
                                depth += 1;
                            }
                            Some((_, ':')) if matches!(chars.peek(), Some((_, ')'))) => {
                                chars.next();
                                depth -= 1;
                            }
                            Some(_) => {}
                            None => break,
                        }
                    }
                }
            }
            '$' => {
                let mut name = String::new();
                while let Some((_, d)) = chars.peek() {
                    if d.is_alphanumeric() || *d == '_' || *d == '-' || *d == '.' || *d == ':' {
                        name.push(*d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if !name.is_empty() {
                    // prefixes are opaque here; the local name is what the
                    // dependency check compares
                    let local = name.rsplit(':').next().unwrap_or(&name);
                    names.push(Name::unprefixed(local));
                }
            }
            _ => {}
        }
    }
    names
}
