//! Validation-time rejections

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reason code attached to a rejected record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Email present but not a valid address
    InvalidEmail,
    /// Date present but no known format matched
    InvalidDate,
    /// No identifying field could be normalized
    MissingIdentity,
}

impl RejectionReason {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::InvalidEmail => "invalid_email",
            RejectionReason::InvalidDate => "invalid_date",
            RejectionReason::MissingIdentity => "missing_identity",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failing field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFailure {
    /// Canonical field name (`email`, `signup_date`, ...)
    pub field: String,
    pub reason: RejectionReason,
    /// Human-readable detail, usually echoing the offending input
    pub detail: String,
}

impl FieldFailure {
    pub fn new(field: impl Into<String>, reason: RejectionReason, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.field, self.reason, self.detail)
    }
}

/// A record that could not be turned into a `CanonicalRecord`.
///
/// `reason` is the reason of the first failing field; `failures` holds every
/// failure found during the pass.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("record rejected ({reason}): {}", summarize(.failures))]
pub struct RejectionError {
    pub reason: RejectionReason,
    pub failures: Vec<FieldFailure>,
}

impl RejectionError {
    /// Rejection whose primary reason comes from `failure`.
    pub fn new(failure: FieldFailure) -> Self {
        Self {
            reason: failure.reason,
            failures: vec![failure],
        }
    }

    /// Append further failures; the primary reason is kept.
    pub fn with_failures(mut self, more: impl IntoIterator<Item = FieldFailure>) -> Self {
        self.failures.extend(more);
        self
    }

    /// Build from the collected failures; `None` when there are none.
    pub fn from_failures(failures: Vec<FieldFailure>) -> Option<Self> {
        let reason = failures.first()?.reason;
        Some(Self { reason, failures })
    }

    /// Names of every offending field, in check order.
    pub fn fields(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.field.as_str()).collect()
    }

    /// Whether any failure carries the given reason.
    pub fn has_reason(&self, reason: RejectionReason) -> bool {
        self.failures.iter().any(|f| f.reason == reason)
    }
}

fn summarize(failures: &[FieldFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
