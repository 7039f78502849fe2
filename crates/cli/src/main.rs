//! # Record Syncer CLI
//!
//! Command-line entry point.
//!
//! Provides:
//! - configuration loading and validation
//! - record validation and delivery
//! - graceful cancellation on Ctrl+C, SIGTERM or timeout

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_probe, run_sync, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(
        ObservabilityConfig::default()
            .with_log_format(cli.log_format.into())
            .with_default_level(cli.log_level()),
    )?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Record Syncer CLI starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_sync(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
        Commands::Probe(args) => run_probe(args).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
