//! Run statistics and the printed summary.

use std::time::Duration;

use contracts::{RejectionError, SyncReport};
use dispatcher::MetricsSnapshot;
use ingestion::ValidationSummary;
use observability::SyncMetricsAggregator;

/// Records listed individually in the summary before eliding the rest
const MAX_LISTED: usize = 20;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Records read from the input file
    pub input_records: usize,

    /// Records that passed validation
    pub accepted: usize,

    /// Rejected records with their input position
    pub rejections: Vec<(usize, RejectionError)>,

    /// Delivery report, absent when delivery never produced one
    pub report: Option<SyncReport>,

    /// Wall-clock time of the whole run
    pub duration: Duration,

    /// Requests as counted by the endpoint
    pub endpoint: MetricsSnapshot,

    pub aggregator: SyncMetricsAggregator,
}

impl RunStats {
    pub fn new(input_records: usize) -> Self {
        Self {
            input_records,
            ..Self::default()
        }
    }

    pub fn record_validation(&mut self, summary: &ValidationSummary) {
        self.accepted = summary.accepted.len();
        self.rejections = summary.rejected.clone();
        self.aggregator.record_validation(
            self.accepted,
            self.rejections.iter().map(|(_, r)| r.reason.as_str()),
        );
    }

    pub fn record_report(&mut self, report: SyncReport) {
        self.aggregator.record_report(&report);
        self.report = Some(report);
    }

    pub fn finish(&mut self, duration: Duration, endpoint: MetricsSnapshot) {
        self.duration = duration;
        self.endpoint = endpoint;
    }

    /// Records that were accepted but not delivered
    pub fn undelivered(&self) -> usize {
        self.report.as_ref().map_or(self.accepted, |r| r.failed)
    }

    /// Records per second over the whole run
    pub fn throughput(&self) -> f64 {
        let delivered = self.report.as_ref().map_or(0, |r| r.delivered);
        if self.duration.as_secs_f64() > 0.0 {
            delivered as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!();
        println!("Overview");
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("  Input records: {}", self.input_records);
        println!("  Accepted: {}", self.accepted);
        println!("  Rejected: {}", self.rejections.len());
        println!("  Throughput: {:.2} records/s", self.throughput());
        println!(
            "  Endpoint requests: {} ({} individual, {} batches, {} failed)",
            self.endpoint.requests(),
            self.endpoint.submitted,
            self.endpoint.batches,
            self.endpoint.failures
        );
        println!();
        print!("{}", self.aggregator.summary());

        if !self.rejections.is_empty() {
            println!("\nRejected records");
            for (index, rejection) in self.rejections.iter().take(MAX_LISTED) {
                println!("  #{index}: {rejection}");
            }
            elide(self.rejections.len());
        }

        if let Some(report) = self.report.as_ref().filter(|r| !r.failures.is_empty()) {
            println!("\nUndelivered records");
            for failure in report.failures.iter().take(MAX_LISTED) {
                println!(
                    "  #{} {}: {} after {} attempt(s): {}",
                    failure.index,
                    failure.record_id,
                    failure.reason,
                    failure.attempts,
                    failure.detail
                );
            }
            elide(report.failures.len());
        }

        println!();
    }
}

fn elide(total: usize) {
    if total > MAX_LISTED {
        println!("  ... and {} more", total - MAX_LISTED);
    }
}
