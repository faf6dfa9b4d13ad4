pub mod error;
pub mod instruction;
pub mod pattern;
pub mod stylesheet;
pub mod value_template;

pub use error::{Error, ErrorCode, Result, SourceLocation};
