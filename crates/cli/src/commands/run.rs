//! `run` command implementation.

use anyhow::{Context, Result};
use sync_engine::CancellationToken;
use tracing::{error, info};

use super::{load_config, Overrides};
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{
    spawn_cancel_on_shutdown, timeout_from_secs, Pipeline, PipelineConfig, PipelineOutcome,
    RunStats,
};

/// Execute the `run` command
pub async fn run_sync(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), input = %args.input.display(), "Loading configuration");

    if !args.input.exists() {
        return Err(CliError::input_not_found(args.input.display().to_string()).into());
    }

    let overrides = Overrides {
        endpoint_url: args.endpoint_url.clone(),
        max_retries: args.max_retries,
    };
    let config = load_config(&args.config, &overrides)?;

    info!(
        endpoint = %config.endpoint.name,
        kind = ?config.endpoint.kind,
        max_retries = config.delivery.max_retries,
        max_concurrency = config.delivery.max_concurrency,
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let cancel = CancellationToken::new();
    let watcher = spawn_cancel_on_shutdown(cancel.clone(), timeout_from_secs(args.timeout));

    let pipeline = Pipeline::new(PipelineConfig {
        config,
        input: args.input.clone(),
        dry_run: args.dry_run,
    });
    let outcome = pipeline.run(cancel.clone()).await;

    // stop the signal watcher
    cancel.cancel();
    watcher.await.context("Shutdown watcher failed")?;

    match outcome.context("Sync run failed")? {
        PipelineOutcome::Finished(stats) => {
            report(&stats, args.json)?;
            let failed = stats.undelivered();
            if failed > 0 {
                return Err(CliError::DeliveryIncomplete {
                    failed,
                    total: stats.accepted,
                }
                .into());
            }
            info!("Record Syncer finished");
            Ok(())
        }
        PipelineOutcome::Unreachable(stats, err) => {
            report(&stats, args.json)?;
            error!(error = %err, "Endpoint unreachable");
            Err(err.into())
        }
    }
}

fn report(stats: &RunStats, json: bool) -> Result<()> {
    if json {
        let json = serde_json::to_string_pretty(&stats.report)
            .context("Failed to serialize delivery report")?;
        println!("{json}");
    } else {
        stats.print_summary();
    }
    Ok(())
}
