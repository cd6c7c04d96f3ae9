//! Asset pipelines for a static site.
//!
//! Compiles style sheets, bundles scripts, assembles HTML pages from partials,
//! and copies fonts, images, and vendor scripts from `src/` into `dist/`.

pub mod builder;
pub mod clean;
pub mod config;
pub mod copy;
pub mod error;
pub mod html;
pub mod paths;
pub mod scripts;
pub mod styles;

pub use builder::{BuildResult, Pipeline, Stage, StageReport};
pub use config::{IndentType, PipelineConfig, StyleEntry, StyleOptions};
pub use error::PipelineError;
pub use paths::{AssetPaths, Paths};
