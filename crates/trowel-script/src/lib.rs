//! Script pipeline: lower each source file to a compatible ES target,
//! concatenate the results behind one copy of the runtime helpers with a
//! combined source map, and minify the bundle.

pub mod bundle;
pub mod downlevel;
pub mod helpers;
pub mod minify;
pub mod traits;

pub use bundle::{bundle_scripts, Bundle, BundleResult};
pub use downlevel::Downleveler;
pub use minify::{is_minified_name, minified_name, minify};
pub use traits::{ScriptError, ScriptSource, ScriptTransform, TransformedScript};
