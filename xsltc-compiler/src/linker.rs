use ahash::{HashSet, HashSetExt};

use xsltc_ast::stylesheet::Stylesheet;
use xsltc_ast::{Error, ErrorCode, Result};

use crate::event::ParseAttribute;

/// Counters and state shared across every module of one compilation
/// session. One resolver governs a session; each module it loads draws a
/// distinct precedence, and the loading set catches circular references.
#[derive(Debug)]
pub struct Session {
    next_precedence: u32,
    next_decl_index: u32,
    loading: HashSet<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            next_precedence: 1,
            next_decl_index: 0,
            loading: HashSet::new(),
        }
    }

    pub fn next_precedence(&mut self) -> u32 {
        let value = self.next_precedence;
        self.next_precedence += 1;
        value
    }

    pub fn next_decl_index(&mut self) -> u32 {
        let value = self.next_decl_index;
        self.next_decl_index += 1;
        value
    }

    /// Mark a base URI as being loaded. A URI already in the set means
    /// the import tree references itself.
    pub fn begin_loading(&mut self, base_uri: &str, kind: ResolveKind) -> Result<()> {
        if !self.loading.insert(base_uri.to_string()) {
            let code = match kind {
                ResolveKind::Import => ErrorCode::XTSE0210,
                ResolveKind::Include => ErrorCode::XTSE0180,
            };
            return Err(Error::new(
                code,
                format!("'{}' directly or indirectly loads itself", base_uri),
            ));
        }
        Ok(())
    }

    pub fn finish_loading(&mut self, base_uri: &str) {
        self.loading.remove(base_uri);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveKind {
    Import,
    Include,
}

/// Loads the module behind an xsl:import or xsl:include href and compiles
/// it within the given session.
///
/// An imported module is sealed with its own precedence drawn from the
/// session, after its own imports. An included module is sealed with the
/// pending precedence so the including module's seal patches it in.
pub trait StylesheetResolver<E> {
    fn resolve(
        &mut self,
        href: &str,
        base: Option<&str>,
        kind: ResolveKind,
        session: &mut Session,
    ) -> Result<Stylesheet<E>>;
}

/// Resolves a package name and version constraint for xsl:use-package.
pub trait PackageResolver<E> {
    fn resolve(
        &mut self,
        name: &str,
        version: Option<&str>,
        base: Option<&str>,
        session: &mut Session,
    ) -> Result<Stylesheet<E>>;
}

/// The external XML Schema parser; inline xs:schema content under
/// xsl:import-schema is forwarded here event by event.
pub trait SchemaParser {
    fn start_element(
        &mut self,
        uri: &str,
        local: &str,
        attributes: &[ParseAttribute],
    ) -> Result<()>;
    fn end_element(&mut self, uri: &str, local: &str) -> Result<()>;
    fn characters(&mut self, text: &str) -> Result<()>;
    /// Called when the inline schema's root element closes.
    fn finish(&mut self) -> Result<()>;
}
