//! Development server command.

use std::path::Path;

use anyhow::Result;
use trowel_server::DevServer;

use super::build::{build, pipeline};
use super::config::load_config;

/// Build once, then serve with live reload until interrupted.
pub async fn run(config_path: &Path, port: Option<u16>, open: bool) -> Result<()> {
    let file_config = load_config(config_path)?;
    let mut config = file_config.server_config();
    if let Some(port) = port {
        config.port = port;
    }
    config.open = config.open && open;

    let pipeline = pipeline(&file_config, config_path)?;
    build(&pipeline).await?;

    tracing::info!("Watching source files for changes");

    DevServer::new(config, pipeline).start().await?;

    Ok(())
}
