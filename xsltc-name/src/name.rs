use crate::namespaces::{is_reserved, NamespaceLookup};

/// An expanded XML name: local name, optional namespace URI, optional
/// original prefix. The canonical internal rendering is Clark notation,
/// `{uri}local`.
#[derive(Debug, Clone, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Name {
    local: String,
    namespace: Option<String>,
    prefix: Option<String>,
}

// the prefix carries no identity
impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.local.hash(state);
        self.namespace.hash(state);
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.local == other.local && self.namespace == other.namespace
    }
}

impl Name {
    pub fn new(local: String, namespace: Option<String>, prefix: Option<String>) -> Self {
        Name {
            local,
            namespace,
            prefix,
        }
    }

    pub fn unprefixed(local: &str) -> Self {
        Name {
            local: local.to_string(),
            namespace: None,
            prefix: None,
        }
    }

    pub fn uri_qualified(uri: &str, local: &str) -> Self {
        let namespace = if uri.is_empty() {
            None
        } else {
            Some(uri.to_string())
        };
        Name {
            local: local.to_string(),
            namespace,
            prefix: None,
        }
    }

    pub fn prefixed(prefix: &str, local: &str, namespaces: impl NamespaceLookup) -> Option<Self> {
        let namespace = namespaces.by_prefix(prefix)?;
        Some(Name {
            local: local.to_string(),
            namespace: Some(namespace.to_string()),
            prefix: Some(prefix.to_string()),
        })
    }

    /// Parse a lexical QName (`local` or `prefix:local`) against in-scope
    /// bindings. `None` when the prefix is undeclared; the caller owns the
    /// error code for that situation.
    pub fn parse_lexical(s: &str, namespaces: impl NamespaceLookup) -> Option<Self> {
        match s.split_once(':') {
            Some((prefix, local)) => Self::prefixed(prefix, local, namespaces),
            None => Some(Self::unprefixed(s)),
        }
    }

    /// Parse `Q{uri}local`, falling back to lexical QName parsing.
    pub fn parse_eqname(s: &str, namespaces: impl NamespaceLookup) -> Option<Self> {
        if let Some(rest) = s.strip_prefix("Q{") {
            let (uri, local) = rest.split_once('}')?;
            Some(Self::uri_qualified(uri.trim(), local))
        } else {
            Self::parse_lexical(s, namespaces)
        }
    }

    /// Parse Clark notation, `{uri}local` or bare `local`.
    pub fn parse_clark(s: &str) -> Option<Self> {
        if let Some(rest) = s.strip_prefix('{') {
            let (uri, local) = rest.split_once('}')?;
            Some(Self::uri_qualified(uri, local))
        } else if s.is_empty() {
            None
        } else {
            Some(Self::unprefixed(s))
        }
    }

    /// Apply a default namespace to a name with no prefix and no namespace.
    /// Used for unprefixed element names under `xpath-default-namespace`.
    pub fn with_default_namespace(self, uri: Option<&str>) -> Self {
        if let Some(uri) = uri {
            if self.namespace.is_none() && !uri.is_empty() {
                return Name {
                    local: self.local,
                    namespace: Some(uri.to_string()),
                    prefix: None,
                };
            }
        }
        self
    }

    #[inline]
    pub fn local(&self) -> &str {
        &self.local
    }

    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[inline]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn in_reserved_namespace(&self) -> bool {
        self.namespace.as_deref().is_some_and(is_reserved)
    }

    pub fn to_clark(&self) -> String {
        if let Some(namespace) = &self.namespace {
            format!("{{{}}}{}", namespace, self.local)
        } else {
            self.local.clone()
        }
    }

    pub fn to_full_name(&self) -> String {
        match &self.prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, self.local),
            _ => self.local.clone(),
        }
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_clark())
    }
}
