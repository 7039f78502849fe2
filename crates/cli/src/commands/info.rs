//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::SyncerConfig;
use serde::Serialize;
use tracing::info;

use super::{load_config, Overrides};
use crate::cli::InfoArgs;

/// Effective configuration for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    #[serde(flatten)]
    config: &'a SyncerConfig,
    /// Upper bound on one record's individual attempts
    max_attempts: u32,
    /// Worst-case wait before the last individual retry, in milliseconds
    longest_backoff_ms: u128,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config(&args.config, &Overrides::default())?;
    let policy = config_loader::ConfigLoader::delivery_policy(&config)?;
    let info = ConfigInfo {
        config: &config,
        max_attempts: policy.max_attempts(),
        longest_backoff_ms: policy.backoff_delay(policy.max_retries()).as_millis(),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{json}");
    } else {
        print_info(&info);
    }
    Ok(())
}

fn print_info(info: &ConfigInfo<'_>) {
    let endpoint = &info.config.endpoint;
    let delivery = &info.config.delivery;

    println!("\n=== Configuration ===\n");
    println!("Version: {:?}", info.config.version);

    println!("\nEndpoint:");
    println!("  Name: {}", endpoint.name);
    println!("  Kind: {:?}", endpoint.kind);
    if let Some(url) = &endpoint.url {
        println!("  URL: {url}");
    }
    if let Some(batch_url) = endpoint.effective_batch_url() {
        println!("  Batch URL: {batch_url}");
    }
    println!("  Timeout: {} ms", endpoint.timeout_ms);

    println!("\nDelivery:");
    println!(
        "  Retries: {} ({} attempts per record)",
        delivery.max_retries, info.max_attempts
    );
    println!(
        "  Backoff: {} ms x {} (longest wait {} ms)",
        delivery.base_backoff_ms, delivery.backoff_multiplier, info.longest_backoff_ms
    );
    println!("  Jitter: {}", if delivery.jitter { "on" } else { "off" });
    println!("  Max concurrency: {}", delivery.max_concurrency);
    println!(
        "  Rate limit: {} request(s) per {} ms",
        delivery.rate_limit_requests, delivery.rate_limit_window_ms
    );
    if delivery.batch_fallback_threshold == 0 {
        println!("  Batch fallback: disabled");
    } else {
        println!(
            "  Batch fallback: after {} consecutive failures, {} record(s) per batch",
            delivery.batch_fallback_threshold, delivery.batch_size
        );
    }
    println!();
}
