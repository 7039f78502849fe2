//! Sync Engine error types

use contracts::SyncReport;
use thiserror::Error;

/// Run-level failure.
///
/// Per-record failures never show up here; they are part of the report.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Batch fallback engaged, every batch failed at the transport level and
    /// nothing was delivered.
    #[error("endpoint unreachable: {failed} record(s) could not be delivered, batch fallback exhausted")]
    EndpointUnreachable {
        failed: usize,
        /// Full per-record report of the failed run
        report: Box<SyncReport>,
    },

    /// A delivery task panicked or was aborted
    #[error("delivery task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SyncError {
    pub(crate) fn unreachable(report: SyncReport) -> Self {
        Self::EndpointUnreachable {
            failed: report.failed,
            report: Box::new(report),
        }
    }

    /// Report of the run, when the run got far enough to produce one.
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::EndpointUnreachable { report, .. } => Some(report),
            Self::Join(_) => None,
        }
    }
}
