//! Output cleanup command.

use std::path::Path;

use anyhow::{Context, Result};
use trowel_pipeline::Paths;

use super::config::{load_config, project_root};

/// Run the clean command.
pub fn run(config_path: &Path) -> Result<()> {
    let file_config = load_config(config_path)?;
    let config = file_config.pipeline_config(project_root(config_path)?);
    let paths = Paths::from_config(&config);

    trowel_pipeline::clean::clean(&paths.dist_root)
        .with_context(|| format!("Failed to clean {}", paths.dist_root.display()))?;

    Ok(())
}
