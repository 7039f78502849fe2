//! Validation metrics

use contracts::RejectionReason;
use std::sync::atomic::{AtomicU64, Ordering};

/// Validation counters, shared by every caller of one validator.
#[derive(Debug, Default)]
pub struct ValidationMetrics {
    /// Records checked
    pub records_seen: AtomicU64,

    /// Records turned into canonical records
    pub records_accepted: AtomicU64,

    /// Rejections with `InvalidEmail`
    pub invalid_email: AtomicU64,

    /// Rejections with `InvalidDate`
    pub invalid_date: AtomicU64,

    /// Rejections with `MissingIdentity`
    pub missing_identity: AtomicU64,
}

impl ValidationMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted record
    pub fn record_accepted(&self) {
        self.records_seen.fetch_add(1, Ordering::Relaxed);
        self.records_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejection by its primary reason
    pub fn record_rejected(&self, reason: RejectionReason) {
        self.records_seen.fetch_add(1, Ordering::Relaxed);
        let counter = match reason {
            RejectionReason::InvalidEmail => &self.invalid_email,
            RejectionReason::InvalidDate => &self.invalid_date,
            RejectionReason::MissingIdentity => &self.missing_identity,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> ValidationMetricsSnapshot {
        ValidationMetricsSnapshot {
            records_seen: self.records_seen.load(Ordering::Relaxed),
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            invalid_email: self.invalid_email.load(Ordering::Relaxed),
            invalid_date: self.invalid_date.load(Ordering::Relaxed),
            missing_identity: self.missing_identity.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationMetricsSnapshot {
    pub records_seen: u64,
    pub records_accepted: u64,
    pub invalid_email: u64,
    pub invalid_date: u64,
    pub missing_identity: u64,
}

impl ValidationMetricsSnapshot {
    /// Snapshot fields are loaded one by one, so a concurrent accept can
    /// leave `records_accepted` ahead of `records_seen`.
    pub fn records_rejected(&self) -> u64 {
        self.records_seen.saturating_sub(self.records_accepted)
    }
}
