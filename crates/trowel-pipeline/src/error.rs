//! Pipeline errors.

use std::path::PathBuf;

/// Errors that can occur while running a pipeline.
///
/// `Style` is reported per entry and never stops a build. `Io` and `Join`
/// are fatal.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Style error in {entry}: {message}")]
    Style { entry: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Pipeline task failed: {0}")]
    Join(String),
}

impl PipelineError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
