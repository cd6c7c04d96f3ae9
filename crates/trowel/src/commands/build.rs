//! Asset build command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use trowel_pipeline::{BuildResult, Pipeline};

use super::config::{load_config, project_root, ConfigFile};

/// Create the pipelines for a loaded configuration.
pub fn pipeline(file_config: &ConfigFile, config_path: &Path) -> Result<Arc<Pipeline>> {
    let config = file_config.pipeline_config(project_root(config_path)?);

    let pipeline = Pipeline::new(config).context("Invalid pipeline configuration")?;
    Ok(Arc::new(pipeline))
}

/// Run every pipeline once and log a summary.
pub async fn build(pipeline: &Arc<Pipeline>) -> Result<BuildResult> {
    let result = pipeline.build().await.context("Build failed")?;

    for report in &result.reports {
        tracing::debug!(
            "{}: {} written, {} unchanged, {} failed",
            report.stage,
            report.written.len(),
            report.unchanged,
            report.failed
        );
    }

    tracing::info!(
        "Wrote {} files in {}ms ({} failed)",
        result.files_written(),
        result.duration_ms,
        result.failures()
    );
    tracing::info!("Output: {}", result.output_dir.display());

    Ok(result)
}

/// Run the build command.
pub async fn run(config_path: &Path) -> Result<()> {
    tracing::info!("Building assets...");

    let file_config = load_config(config_path)?;
    let pipeline = pipeline(&file_config, config_path)?;
    build(&pipeline).await?;

    Ok(())
}
