//! Trait definitions for script transforms.

use oxc_sourcemap::SourceMap;

/// A script file to run through the pipeline.
#[derive(Debug, Clone)]
pub struct ScriptSource {
    /// Name recorded in source maps, relative to the script root
    pub name: String,

    /// File contents
    pub source: String,
}

impl ScriptSource {
    /// Create a new script source.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Output of transforming a single script.
#[derive(Debug, Clone)]
pub struct TransformedScript {
    /// Name of the original script
    pub name: String,

    /// Generated code
    pub code: String,

    /// Map from generated code back to the original script
    pub map: Option<SourceMap>,
}

/// Errors that can occur in the script pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Parse error in {name}: {message}")]
    Parse { name: String, message: String },

    #[error("Transform error in {name}: {message}")]
    Transform { name: String, message: String },

    #[error("{name} clashes with an earlier script: {message}")]
    Conflict { name: String, message: String },

    #[error("Minify error in {name}: {message}")]
    Minify { name: String, message: String },

    #[error("Invalid target '{target}': {message}")]
    InvalidTarget { target: String, message: String },
}

/// A per-file script transform.
pub trait ScriptTransform: Send + Sync {
    /// Transform identifier (e.g., "downlevel")
    fn name(&self) -> &'static str;

    /// Transform one script.
    fn transform(&self, script: &ScriptSource) -> Result<TransformedScript, ScriptError>;
}

/// Join diagnostics into one message.
pub(crate) fn join_diagnostics<D: std::fmt::Display>(diagnostics: &[D]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
