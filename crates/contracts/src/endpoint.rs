//! DeliveryEndpoint trait - the remote collection endpoint seen by the sync engine

use thiserror::Error;

use crate::CanonicalRecord;

/// Failure reported by an endpoint for a single submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Transient or server-side failure; worth retrying
    #[error("retryable delivery failure{}: {message}", fmt_status(.status))]
    Retryable {
        status: Option<u16>,
        message: String,
    },

    /// Request was refused for good (malformed payload, auth, ...)
    #[error("non-retryable delivery failure{}: {message}", fmt_status(.status))]
    NonRetryable {
        status: Option<u16>,
        message: String,
    },

    /// Transport-level failure: connect error, timeout, DNS
    #[error("endpoint unreachable: {message}")]
    Unreachable { message: String },
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl DeliveryError {
    pub fn retryable(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Retryable {
            status,
            message: message.into(),
        }
    }

    pub fn non_retryable(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::NonRetryable {
            status,
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status.
    ///
    /// 408, 425, 429 and every 5xx are retryable; any other status is not.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            408 | 425 | 429 | 500..=599 => Self::retryable(Some(status), message),
            _ => Self::non_retryable(Some(status), message),
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NonRetryable { .. })
    }

    /// Whether the endpoint could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Retryable { .. } => "retryable",
            Self::NonRetryable { .. } => "non_retryable",
            Self::Unreachable { .. } => "unreachable",
        }
    }

    /// HTTP status, when the endpoint answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Retryable { status, .. } | Self::NonRetryable { status, .. } => *status,
            Self::Unreachable { .. } => None,
        }
    }
}

/// Remote collection endpoint.
///
/// Implementations must be shareable: the sync engine calls them from many
/// workers at once through an `Arc`.
#[trait_variant::make(DeliveryEndpoint: Send)]
pub trait LocalDeliveryEndpoint {
    /// Endpoint name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Submit a single record. `attempt` is 1-based and counts this
    /// record's individual submissions within the run.
    ///
    /// # Errors
    /// Returns the classified delivery failure
    async fn submit(&self, record: &CanonicalRecord, attempt: u32) -> Result<(), DeliveryError>;

    /// Submit several records as one all-or-nothing request.
    async fn submit_batch(&self, records: &[CanonicalRecord]) -> Result<(), DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        for status in [408, 425, 429, 500, 502, 503, 504] {
            assert!(DeliveryError::from_status(status, "").is_retryable(), "{status}");
        }
        for status in [400, 401, 403, 404, 409, 413, 422] {
            assert!(!DeliveryError::from_status(status, "").is_retryable(), "{status}");
        }
    }

    #[test]
    fn test_unreachable_is_retryable() {
        let err = DeliveryError::unreachable("connection refused");
        assert!(err.is_retryable());
        assert!(err.is_unreachable());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_display_includes_status() {
        let err = DeliveryError::from_status(503, "busy");
        assert_eq!(err.to_string(), "retryable delivery failure (HTTP 503): busy");
    }
}
