//! Load, validate and deliver: the `run` command's work.

mod shutdown;
mod stats;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{EndpointConfig, SyncerConfig};
use dispatcher::{create_endpoint, AnyEndpoint, DeliveryEndpoint};
use ingestion::RecordValidator;
use sync_engine::{CancellationToken, SyncEngine, SyncError};
use tracing::{info, warn};

pub use shutdown::spawn_cancel_on_shutdown;
pub use stats::RunStats;

/// Everything the `run` command needs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub config: SyncerConfig,
    pub input: PathBuf,
    /// Replace the configured endpoint with a log-only one
    pub dry_run: bool,
}

/// Result of a pipeline run that got as far as delivery.
///
/// A run the engine declared unreachable still carries its stats.
pub enum PipelineOutcome {
    Finished(RunStats),
    Unreachable(RunStats, SyncError),
}

/// Validate-then-deliver orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run to completion or until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<PipelineOutcome> {
        let start = Instant::now();
        let PipelineConfig {
            config,
            input,
            dry_run,
        } = self.config;

        let raw = ingestion::load_records_from_path(&input)
            .with_context(|| format!("Failed to load records from {}", input.display()))?;

        let validator = RecordValidator::new();
        let summary = validator.validate_all(&raw);
        info!(
            total = summary.total(),
            accepted = summary.accepted.len(),
            rejected = summary.rejected.len(),
            "Validation finished"
        );

        let mut stats = RunStats::new(raw.len());
        stats.record_validation(&summary);

        let endpoint_config = if dry_run {
            info!("Dry run: records are logged instead of sent");
            EndpointConfig::log(format!("{}-dry-run", config.endpoint.name))
        } else {
            config.endpoint.clone()
        };
        let endpoint = Arc::new(
            create_endpoint(&endpoint_config).context("Failed to create delivery endpoint")?,
        );
        let policy = config_loader::ConfigLoader::delivery_policy(&config)?;
        let engine = SyncEngine::new(Arc::clone(&endpoint), policy);

        info!(
            endpoint = endpoint.name(),
            records = summary.accepted.len(),
            "Starting delivery"
        );
        let delivered = engine.deliver(summary.accepted, cancel).await;
        stats.finish(start.elapsed(), endpoint_metrics(&endpoint));

        match delivered {
            Ok(report) => {
                stats.record_report(report);
                Ok(PipelineOutcome::Finished(stats))
            }
            Err(err) => {
                warn!(error = %err, "Delivery run failed");
                if let Some(report) = err.report() {
                    stats.record_report(report.clone());
                }
                Ok(PipelineOutcome::Unreachable(stats, err))
            }
        }
    }
}

fn endpoint_metrics(endpoint: &AnyEndpoint) -> dispatcher::MetricsSnapshot {
    endpoint.metrics().snapshot()
}

/// Timeout as configured on the command line (0 = none).
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
