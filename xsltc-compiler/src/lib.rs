//! An event-driven compilation front end for XSLT 3.0 stylesheets.
//!
//! The compiler consumes a stream of XML parse events and produces a
//! compiled [`Stylesheet`](xsltc_ast::stylesheet::Stylesheet): template
//! rules linked by import precedence, named templates, global variables,
//! functions, keys, and the other declarations. The XPath engine, the
//! transformation runtime, schema parsing and I/O are external
//! collaborators reached through the traits in [`xpath`] and [`linker`].

mod attributes;
mod builder;
mod context;
mod declarations;
mod event;
mod instructions;
mod linker;
mod names;
mod pattern_parser;
mod static_eval;
mod stylesheet_builder;
mod xpath;

pub use builder::Compiler;
pub use event::ParseAttribute;
pub use linker::{PackageResolver, ResolveKind, SchemaParser, Session, StylesheetResolver};
pub use names::{AttributeTable, XsltElement};
pub use static_eval::{Atomic, EvalError, StaticEvaluator};
pub use xpath::{scan_variable_references, SourceExpr, SourceFacade, StaticContext, XPathFacade};
