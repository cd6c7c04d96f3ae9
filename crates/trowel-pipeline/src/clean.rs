//! Output removal.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::PipelineError;

/// Delete the output root. A missing directory is not an error.
pub fn clean(dist_root: &Path) -> Result<(), PipelineError> {
    match fs::remove_dir_all(dist_root) {
        Ok(()) => {
            tracing::info!("Removed {}", dist_root.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("Nothing to clean at {}", dist_root.display());
            Ok(())
        }
        Err(e) => Err(PipelineError::io(dist_root)(e)),
    }
}
