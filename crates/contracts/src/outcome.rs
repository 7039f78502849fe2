//! Delivery outcomes and the SyncReport - Sync Engine output

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why a record ended up `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Transient failures exhausted the retry budget
    RetryableDeliveryFailure,
    /// Endpoint refused the record outright
    NonRetryableDeliveryFailure,
    /// The fallback batch containing the record was rejected
    BatchRejected,
    /// Run was cancelled before the record reached a terminal state
    Cancelled,
}

impl FailureReason {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::RetryableDeliveryFailure => "retryable_delivery_failure",
            FailureReason::NonRetryableDeliveryFailure => "non_retryable_delivery_failure",
            FailureReason::BatchRejected => "batch_rejected",
            FailureReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-record delivery result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Acknowledged by the endpoint
    Delivered {
        /// Requests that carried this record (individual attempts + batch)
        attempts: u32,
        /// Whether the acknowledging request was a fallback batch
        via_batch: bool,
    },
    /// Terminal failure
    Failed {
        reason: FailureReason,
        attempts: u32,
        detail: String,
    },
    /// Not yet resolved
    Pending,
}

impl DeliveryOutcome {
    pub fn failed(reason: FailureReason, attempts: u32, detail: impl Into<String>) -> Self {
        Self::Failed {
            reason,
            attempts,
            detail: detail.into(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Delivered { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
            Self::Pending => 0,
        }
    }
}

/// Outcome of one input record, keyed by its position and identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    /// Position in the input sequence
    pub index: usize,
    /// Record identity (email)
    pub record_id: String,
    pub outcome: DeliveryOutcome,
}

/// Failed record entry of a [`SyncReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub index: usize,
    pub record_id: String,
    pub reason: FailureReason,
    pub attempts: u32,
    pub detail: String,
}

/// Aggregated result of one delivery run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// One entry per input record, in input order
    pub outcomes: Vec<RecordOutcome>,
    pub delivered: usize,
    pub failed: usize,
    pub failures: Vec<FailedRecord>,
    /// Wall-clock duration of the run
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub batch_fallback_engaged: bool,
    /// Requests sent to the endpoint (individual attempts + batches)
    pub total_attempts: u64,
    pub batches_submitted: u64,
}

impl SyncReport {
    /// Build the aggregate counters from the per-record outcomes.
    pub fn from_outcomes(
        outcomes: Vec<RecordOutcome>,
        duration: Duration,
        batch_fallback_engaged: bool,
        total_attempts: u64,
        batches_submitted: u64,
    ) -> Self {
        let delivered = outcomes.iter().filter(|o| o.outcome.is_delivered()).count();
        let failures: Vec<FailedRecord> = outcomes
            .iter()
            .filter_map(|o| match &o.outcome {
                DeliveryOutcome::Failed {
                    reason,
                    attempts,
                    detail,
                } => Some(FailedRecord {
                    index: o.index,
                    record_id: o.record_id.clone(),
                    reason: *reason,
                    attempts: *attempts,
                    detail: detail.clone(),
                }),
                _ => None,
            })
            .collect();

        Self {
            delivered,
            failed: failures.len(),
            failures,
            outcomes,
            duration,
            batch_fallback_engaged,
            total_attempts,
            batches_submitted,
        }
    }

    /// Number of records in the run
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// True when every record was delivered.
    pub fn is_complete(&self) -> bool {
        self.delivered == self.outcomes.len()
    }

    /// Failed records with the given reason.
    pub fn failures_with(&self, reason: FailureReason) -> impl Iterator<Item = &FailedRecord> {
        self.failures.iter().filter(move |f| f.reason == reason)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, outcome: DeliveryOutcome) -> RecordOutcome {
        RecordOutcome {
            index,
            record_id: format!("user{index}@example.com"),
            outcome,
        }
    }

    #[test]
    fn test_report_aggregation() {
        let report = SyncReport::from_outcomes(
            vec![
                outcome(0, DeliveryOutcome::Delivered { attempts: 1, via_batch: false }),
                outcome(1, DeliveryOutcome::failed(FailureReason::BatchRejected, 3, "HTTP 500")),
                outcome(2, DeliveryOutcome::failed(FailureReason::Cancelled, 0, "cancelled")),
            ],
            Duration::from_millis(1500),
            true,
            7,
            1,
        );

        assert_eq!(report.total(), 3);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 2);
        assert!(!report.is_complete());
        assert_eq!(report.failures_with(FailureReason::Cancelled).count(), 1);
        assert_eq!(report.failures[0].record_id, "user1@example.com");
    }

    #[test]
    fn test_report_serializes_duration_in_ms() {
        let report = SyncReport {
            duration: Duration::from_millis(1234),
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["duration"], 1234);
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(!DeliveryOutcome::Pending.is_terminal());
        let failed = DeliveryOutcome::failed(FailureReason::NonRetryableDeliveryFailure, 1, "400");
        assert_eq!(
            failed.failure_reason(),
            Some(FailureReason::NonRetryableDeliveryFailure)
        );
        assert_eq!(failed.attempts(), 1);
    }
}
