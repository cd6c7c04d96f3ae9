//! Textual include pass for HTML pages.
//!
//! Expands `@@include('./partial.html')` directives relative to the file being
//! processed and substitutes `@@name` references from a context of named values.

pub mod context;
pub mod directive;
pub mod includer;

pub use context::Context;
pub use directive::{parse_directives, DirectiveError, Segment};
pub use includer::{IncludeError, IncludeOptions, Includer};
