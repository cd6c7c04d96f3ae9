//! Trowel CLI - asset pipeline and live reload dev server for static sites.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "trowel")]
#[command(about = "Asset pipeline and live reload dev server for static sites")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to trowel.toml config file
    #[arg(short, long, default_value = "trowel.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete the output directory
    Clean,

    /// Run every pipeline once
    Build,

    /// Build, then serve the output with live reload
    Dev {
        /// Port to listen on (defaults to config or 8080)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Clean => {
            commands::clean::run(&cli.config)?;
        }
        Commands::Build => {
            commands::build::run(&cli.config).await?;
        }
        Commands::Dev { port, no_open } => {
            commands::dev::run(&cli.config, port, !no_open).await?;
        }
    }

    Ok(())
}
