use xsltc_name::Name;

/// One attribute delivered with a start-element event, as the XML layer
/// reported it: namespace URI (empty for none), local name, original
/// prefix and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAttribute {
    pub uri: String,
    pub local: String,
    pub prefix: String,
    pub value: String,
}

impl ParseAttribute {
    pub fn new(uri: &str, qname: &str, value: &str) -> Self {
        let (prefix, local) = match qname.split_once(':') {
            Some((prefix, local)) => (prefix.to_string(), local.to_string()),
            None => (String::new(), qname.to_string()),
        };
        Self {
            uri: uri.to_string(),
            local,
            prefix,
            value: value.to_string(),
        }
    }

    pub fn name(&self) -> Name {
        let prefix = if self.prefix.is_empty() {
            None
        } else {
            Some(self.prefix.clone())
        };
        let namespace = if self.uri.is_empty() {
            None
        } else {
            Some(self.uri.clone())
        };
        Name::new(self.local.clone(), namespace, prefix)
    }
}
