use ahash::{HashMap, HashMapExt};

pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
pub const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const FN_NAMESPACE: &str = "http://www.w3.org/2005/xpath-functions";

// Component names must not fall into these; see is_reserved.
const RESERVED_NAMESPACES: [&str; 4] = [
    XSLT_NAMESPACE,
    XML_NAMESPACE,
    XS_NAMESPACE,
    XSI_NAMESPACE,
];

/// Is this URI reserved for names defined by the XSLT, XML or XML Schema
/// specifications? User-defined component names may not live there.
pub fn is_reserved(uri: &str) -> bool {
    RESERVED_NAMESPACES.contains(&uri)
}

/// A prefix to namespace URI mapping, with a default element namespace.
///
/// The `xml` prefix is always bound. An owned snapshot of the in-scope
/// bindings of one element; scoping is handled by whoever builds these.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Namespaces {
    by_prefix: HashMap<String, String>,
    default_element_namespace: String,
}

impl Namespaces {
    pub fn new(by_prefix: HashMap<String, String>, default_element_namespace: String) -> Self {
        Self {
            by_prefix,
            default_element_namespace,
        }
    }

    pub fn declare(&mut self, prefix: &str, uri: &str) {
        if prefix.is_empty() {
            self.default_element_namespace = uri.to_string();
        } else {
            self.by_prefix.insert(prefix.to_string(), uri.to_string());
        }
    }

    pub fn undeclare(&mut self, prefix: &str) {
        if prefix.is_empty() {
            self.default_element_namespace.clear();
        } else {
            self.by_prefix.remove(prefix);
        }
    }

    #[inline]
    pub fn by_prefix(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.by_prefix.get(prefix).map(|s| s.as_str())
    }

    #[inline]
    pub fn default_element_namespace(&self) -> &str {
        &self.default_element_namespace
    }

    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_prefix
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::new(HashMap::new(), String::new())
    }
}

pub trait NamespaceLookup {
    fn by_prefix(&self, prefix: &str) -> Option<&str>;
}

impl NamespaceLookup for Namespaces {
    fn by_prefix(&self, prefix: &str) -> Option<&str> {
        Namespaces::by_prefix(self, prefix)
    }
}

impl<T: NamespaceLookup> NamespaceLookup for &T {
    fn by_prefix(&self, prefix: &str) -> Option<&str> {
        (**self).by_prefix(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_prefix_is_implicit() {
        let namespaces = Namespaces::default();
        assert_eq!(namespaces.by_prefix("xml"), Some(XML_NAMESPACE));
    }

    #[test]
    fn test_declare_and_undeclare() {
        let mut namespaces = Namespaces::default();
        namespaces.declare("a", "http://example.com/a");
        assert_eq!(namespaces.by_prefix("a"), Some("http://example.com/a"));
        namespaces.undeclare("a");
        assert_eq!(namespaces.by_prefix("a"), None);
    }

    #[test]
    fn test_empty_prefix_is_default_element_namespace() {
        let mut namespaces = Namespaces::default();
        namespaces.declare("", "http://example.com/d");
        assert_eq!(
            namespaces.default_element_namespace(),
            "http://example.com/d"
        );
    }

    #[test]
    fn test_reserved() {
        assert!(is_reserved(XSLT_NAMESPACE));
        assert!(is_reserved(XML_NAMESPACE));
        assert!(!is_reserved("http://example.com"));
    }
}
