mod name;
mod namespaces;

pub use name::Name;
pub use namespaces::{
    NamespaceLookup, Namespaces, FN_NAMESPACE, XML_NAMESPACE, XSI_NAMESPACE, XSLT_NAMESPACE,
    XS_NAMESPACE,
};
