//! LogEndpoint - logs records via tracing instead of sending them

use std::sync::Arc;

use contracts::{CanonicalRecord, DeliveryEndpoint, DeliveryError};
use tracing::{info, instrument};

use crate::metrics::EndpointMetrics;

/// Endpoint that accepts everything, for dry runs and debugging
#[derive(Debug)]
pub struct LogEndpoint {
    name: String,
    metrics: Arc<EndpointMetrics>,
}

impl LogEndpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metrics: Arc::new(EndpointMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<EndpointMetrics> {
        &self.metrics
    }
}

impl DeliveryEndpoint for LogEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_endpoint_submit", skip(self, record), fields(endpoint = %self.name))]
    async fn submit(&self, record: &CanonicalRecord, attempt: u32) -> Result<(), DeliveryError> {
        info!(
            email = record.id(),
            attempt,
            name = record.name(),
            tier = %record.subscription_tier(),
            signup_date = ?record.signup_date(),
            "record accepted"
        );
        self.metrics.record_submission(true);
        Ok(())
    }

    #[instrument(name = "log_endpoint_submit_batch", skip(self, records), fields(endpoint = %self.name))]
    async fn submit_batch(&self, records: &[CanonicalRecord]) -> Result<(), DeliveryError> {
        info!(
            size = records.len(),
            first = records.first().map(CanonicalRecord::id),
            "batch accepted"
        );
        self.metrics.record_batch(records.len(), true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Email, SubscriptionTier};

    fn record() -> CanonicalRecord {
        CanonicalRecord::new(
            Email::parse("grace@example.com").unwrap(),
            None,
            SubscriptionTier::Basic,
            None,
        )
    }

    #[tokio::test]
    async fn test_log_endpoint_accepts() {
        let endpoint = LogEndpoint::new("dry-run");
        endpoint.submit(&record(), 1).await.unwrap();
        endpoint.submit_batch(&[record(), record()]).await.unwrap();

        let snapshot = endpoint.metrics().snapshot();
        assert_eq!(snapshot.submitted, 1);
        assert_eq!(snapshot.batches, 1);
        assert_eq!(snapshot.records_accepted, 3);
    }

    #[test]
    fn test_log_endpoint_name() {
        assert_eq!(LogEndpoint::new("my_logger").name(), "my_logger");
    }
}
