//! `probe` command implementation.

use anyhow::{Context, Result};
use dispatcher::{create_endpoint, DeliveryEndpoint};
use tracing::info;

use super::{load_config, Overrides};
use crate::cli::ProbeArgs;
use crate::error::CliError;

/// Execute the `probe` command
pub async fn run_probe(args: &ProbeArgs) -> Result<()> {
    let overrides = Overrides {
        endpoint_url: args.endpoint_url.clone(),
        ..Overrides::default()
    };
    let config = load_config(&args.config, &overrides)?;
    let endpoint = create_endpoint(&config.endpoint).context("Failed to create endpoint")?;

    info!(endpoint = endpoint.name(), "Probing endpoint");
    match endpoint.probe().await {
        Ok(()) => {
            println!("✓ Endpoint '{}' is reachable", endpoint.name());
            Ok(())
        }
        Err(e) => {
            println!("✗ Endpoint '{}' failed: {e}", endpoint.name());
            Err(CliError::probe_failed(endpoint.name(), e.to_string()).into())
        }
    }
}
