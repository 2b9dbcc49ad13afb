//! POAMFlow CLI - Main Binary
//!
//! Drives POA&M records through the DoD approval chain:
//! - ISSE → ISSO → ISSM → RMO → AO review
//! - Role-based authority checks on every action
//! - JSON records file or PostgreSQL storage

use anyhow::Result;
use clap::Parser;
use poamflow_node::{commands, Cli, NodeConfig};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };

    // Initialize logging
    let log_level = if cli.verbose {
        "debug"
    } else {
        config.node.log_level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_ansi(config.node.colored_logs)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!("Configuration: {:?}", cli.config);

    // Validate configuration
    config.validate()?;

    commands::run(cli, config).await
}
