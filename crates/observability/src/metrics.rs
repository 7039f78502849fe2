//! Delivery metrics
//!
//! Prometheus-facing recorders for the sync engine, plus an in-memory
//! aggregator for end-of-run summaries.

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::{DeliveryOutcome, SyncReport};
use metrics::{counter, gauge, histogram};

/// Record one individual submission.
///
/// `result` is `"success"` or the failure kind reported by the endpoint.
pub fn record_delivery_attempt(endpoint: &str, result: &'static str, latency: Duration) {
    counter!(
        "record_syncer_delivery_attempts_total",
        "endpoint" => endpoint.to_string(),
        "result" => result
    )
    .increment(1);
    histogram!(
        "record_syncer_delivery_latency_ms",
        "endpoint" => endpoint.to_string()
    )
    .record(latency.as_secs_f64() * 1000.0);
}

/// Record one fallback batch.
pub fn record_batch_submission(endpoint: &str, size: usize, success: bool, latency: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "record_syncer_batches_total",
        "endpoint" => endpoint.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("record_syncer_batch_size").record(size as f64);
    histogram!(
        "record_syncer_batch_latency_ms",
        "endpoint" => endpoint.to_string()
    )
    .record(latency.as_secs_f64() * 1000.0);
}

/// Record the switch to batch mode.
pub fn record_fallback_engaged(endpoint: &str) {
    counter!(
        "record_syncer_fallback_engaged_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

/// Record the final state of one record.
pub fn record_record_outcome(endpoint: &str, outcome: &DeliveryOutcome) {
    let state = match outcome {
        DeliveryOutcome::Delivered { via_batch: true, .. } => "delivered_batch",
        DeliveryOutcome::Delivered { .. } => "delivered",
        DeliveryOutcome::Failed { reason, .. } => reason.as_str(),
        DeliveryOutcome::Pending => "pending",
    };
    counter!(
        "record_syncer_records_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => state
    )
    .increment(1);
}

/// Record the outcome of a whole run.
pub fn record_sync_report(endpoint: &str, report: &SyncReport) {
    for outcome in &report.outcomes {
        record_record_outcome(endpoint, &outcome.outcome);
    }
    counter!("record_syncer_runs_total", "endpoint" => endpoint.to_string()).increment(1);
    gauge!("record_syncer_last_run_delivered").set(report.delivered as f64);
    gauge!("record_syncer_last_run_failed").set(report.failed as f64);
    histogram!("record_syncer_run_duration_ms").record(report.duration.as_secs_f64() * 1000.0);
}

/// Delivery metrics aggregator
///
/// Accumulates validation results and run reports in memory for a printable
/// summary.
#[derive(Debug, Clone, Default)]
pub struct SyncMetricsAggregator {
    pub runs: u64,
    pub records_accepted: u64,
    pub records_rejected: u64,
    pub records_delivered: u64,
    pub records_failed: u64,
    pub total_attempts: u64,
    pub batches_submitted: u64,
    pub fallback_runs: u64,
    /// Run durations in milliseconds
    pub duration_stats: RunningStats,
    /// Attempts per record, delivered or not
    pub attempt_stats: RunningStats,
    /// Rejections per reason
    pub rejection_counts: BTreeMap<String, u64>,
    /// Delivery failures per reason
    pub failure_counts: BTreeMap<String, u64>,
}

impl SyncMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one validation pass: accepted count plus one reason per rejection.
    pub fn record_validation<'a, I>(&mut self, accepted: usize, rejections: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.records_accepted += accepted as u64;
        for reason in rejections {
            self.records_rejected += 1;
            *self.rejection_counts.entry(reason.to_string()).or_insert(0) += 1;
        }
    }

    /// Fold in one delivery run.
    pub fn record_report(&mut self, report: &SyncReport) {
        self.runs += 1;
        self.records_delivered += report.delivered as u64;
        self.records_failed += report.failed as u64;
        self.total_attempts += report.total_attempts;
        self.batches_submitted += report.batches_submitted;
        if report.batch_fallback_engaged {
            self.fallback_runs += 1;
        }
        self.duration_stats
            .push(report.duration.as_secs_f64() * 1000.0);

        for outcome in &report.outcomes {
            self.attempt_stats.push(f64::from(outcome.outcome.attempts()));
        }
        for failure in &report.failures {
            *self
                .failure_counts
                .entry(failure.reason.as_str().to_string())
                .or_insert(0) += 1;
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let resolved = self.records_delivered + self.records_failed;
        let validated = self.records_accepted + self.records_rejected;
        MetricsSummary {
            runs: self.runs,
            records_accepted: self.records_accepted,
            records_rejected: self.records_rejected,
            records_delivered: self.records_delivered,
            records_failed: self.records_failed,
            total_attempts: self.total_attempts,
            batches_submitted: self.batches_submitted,
            fallback_runs: self.fallback_runs,
            rejection_rate: percent(self.records_rejected, validated),
            delivery_rate: percent(self.records_delivered, resolved),
            duration_ms: StatsSummary::from(&self.duration_stats),
            attempts_per_record: StatsSummary::from(&self.attempt_stats),
            rejection_counts: self.rejection_counts.clone(),
            failure_counts: self.failure_counts.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Printable summary of a [`SyncMetricsAggregator`].
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub runs: u64,
    pub records_accepted: u64,
    pub records_rejected: u64,
    pub records_delivered: u64,
    pub records_failed: u64,
    pub total_attempts: u64,
    pub batches_submitted: u64,
    pub fallback_runs: u64,
    pub rejection_rate: f64,
    pub delivery_rate: f64,
    pub duration_ms: StatsSummary,
    pub attempts_per_record: StatsSummary,
    pub rejection_counts: BTreeMap<String, u64>,
    pub failure_counts: BTreeMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Record Sync Summary ===")?;
        writeln!(
            f,
            "Validated: {} accepted, {} rejected ({:.2}%)",
            self.records_accepted, self.records_rejected, self.rejection_rate
        )?;
        writeln!(
            f,
            "Delivered: {} of {} ({:.2}%)",
            self.records_delivered,
            self.records_delivered + self.records_failed,
            self.delivery_rate
        )?;
        writeln!(
            f,
            "Requests: {} ({} batches, fallback in {} of {} runs)",
            self.total_attempts, self.batches_submitted, self.fallback_runs, self.runs
        )?;
        writeln!(f, "Attempts per record: {}", self.attempts_per_record)?;
        writeln!(f, "Run duration (ms): {}", self.duration_ms)?;

        if !self.rejection_counts.is_empty() {
            writeln!(f, "Rejections:")?;
            for (reason, count) in &self.rejection_counts {
                writeln!(f, "  {reason}: {count}")?;
            }
        }
        if !self.failure_counts.is_empty() {
            writeln!(f, "Delivery failures:")?;
            for (reason, count) in &self.failure_counts {
                writeln!(f, "  {reason}: {count}")?;
            }
        }

        Ok(())
    }
}

/// Summary statistics of a [`RunningStats`].
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean and variance (Welford).
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FailureReason, RecordOutcome};

    fn report() -> SyncReport {
        let outcomes = vec![
            RecordOutcome {
                index: 0,
                record_id: "a@example.com".into(),
                outcome: DeliveryOutcome::Delivered {
                    attempts: 1,
                    via_batch: false,
                },
            },
            RecordOutcome {
                index: 1,
                record_id: "b@example.com".into(),
                outcome: DeliveryOutcome::Delivered {
                    attempts: 3,
                    via_batch: true,
                },
            },
            RecordOutcome {
                index: 2,
                record_id: "c@example.com".into(),
                outcome: DeliveryOutcome::failed(FailureReason::NonRetryableDeliveryFailure, 2, "400"),
            },
        ];
        SyncReport::from_outcomes(outcomes, Duration::from_millis(120), true, 6, 1)
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_record_report() {
        let mut aggregator = SyncMetricsAggregator::new();
        aggregator.record_report(&report());

        assert_eq!(aggregator.runs, 1);
        assert_eq!(aggregator.records_delivered, 2);
        assert_eq!(aggregator.records_failed, 1);
        assert_eq!(aggregator.total_attempts, 6);
        assert_eq!(aggregator.fallback_runs, 1);
        assert_eq!(aggregator.failure_counts["non_retryable_delivery_failure"], 1);
        assert!((aggregator.attempt_stats.mean() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_rates() {
        let mut aggregator = SyncMetricsAggregator::new();
        aggregator.record_validation(3, ["invalid_email"]);
        aggregator.record_report(&report());

        let summary = aggregator.summary();
        assert!((summary.rejection_rate - 25.0).abs() < 1e-10);
        assert!((summary.delivery_rate - 200.0 / 3.0).abs() < 1e-10);

        let text = summary.to_string();
        assert!(text.contains("invalid_email: 1"));
        assert!(text.contains("Delivered: 2 of 3"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = SyncMetricsAggregator::new().summary();
        assert_eq!(summary.delivery_rate, 0.0);
        assert_eq!(summary.duration_ms.to_string(), "N/A");
    }

    #[test]
    fn test_recorders_without_exporter() {
        // no recorder installed: calls are no-ops
        record_delivery_attempt("collector", "success", Duration::from_millis(5));
        record_batch_submission("collector", 10, false, Duration::from_millis(5));
        record_fallback_engaged("collector");
        record_sync_report("collector", &report());
    }
}
