//! Per-endpoint request counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Request counters for a single endpoint
#[derive(Debug, Default)]
pub struct EndpointMetrics {
    /// Individual submissions sent
    submitted: AtomicU64,
    /// Batches sent
    batches: AtomicU64,
    /// Records acknowledged, individually or inside a batch
    records_accepted: AtomicU64,
    /// Requests that did not end in a 2xx
    failures: AtomicU64,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn records_accepted(&self) -> u64 {
        self.records_accepted.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Count one individual submission and its result.
    pub fn record_submission(&self, success: bool) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.record_result(1, success);
    }

    /// Count one batch of `size` records and its result.
    pub fn record_batch(&self, size: usize, success: bool) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.record_result(size as u64, success);
    }

    fn record_result(&self, records: u64, success: bool) {
        if success {
            self.records_accepted.fetch_add(records, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted(),
            batches: self.batches(),
            records_accepted: self.records_accepted(),
            failures: self.failures(),
        }
    }
}

/// Point-in-time copy of [`EndpointMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub batches: u64,
    pub records_accepted: u64,
    pub failures: u64,
}

impl MetricsSnapshot {
    /// Requests sent, individual and batch
    pub fn requests(&self) -> u64 {
        self.submitted + self.batches
    }
}
