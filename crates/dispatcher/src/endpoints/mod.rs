//! Delivery endpoint implementations

mod http;
mod log;

use std::sync::Arc;

use contracts::{CanonicalRecord, DeliveryEndpoint, DeliveryError, EndpointConfig, EndpointKind};
use tracing::info;

use crate::error::DispatcherError;
use crate::metrics::EndpointMetrics;

pub use http::{HttpEndpoint, TOTAL_RECORDS_HEADER, USER_AGENT};
pub use log::LogEndpoint;

/// Endpoint selected at runtime from configuration
#[derive(Debug)]
pub enum AnyEndpoint {
    Http(HttpEndpoint),
    Log(LogEndpoint),
}

impl AnyEndpoint {
    pub fn kind(&self) -> EndpointKind {
        match self {
            Self::Http(_) => EndpointKind::Http,
            Self::Log(_) => EndpointKind::Log,
        }
    }

    pub fn metrics(&self) -> &Arc<EndpointMetrics> {
        match self {
            Self::Http(endpoint) => endpoint.metrics(),
            Self::Log(endpoint) => endpoint.metrics(),
        }
    }

    /// Connection test. Log endpoints are always reachable.
    pub async fn probe(&self) -> Result<(), DeliveryError> {
        match self {
            Self::Http(endpoint) => endpoint.probe().await,
            Self::Log(_) => Ok(()),
        }
    }
}

impl From<HttpEndpoint> for AnyEndpoint {
    fn from(endpoint: HttpEndpoint) -> Self {
        Self::Http(endpoint)
    }
}

impl From<LogEndpoint> for AnyEndpoint {
    fn from(endpoint: LogEndpoint) -> Self {
        Self::Log(endpoint)
    }
}

impl DeliveryEndpoint for AnyEndpoint {
    fn name(&self) -> &str {
        match self {
            Self::Http(endpoint) => endpoint.name(),
            Self::Log(endpoint) => endpoint.name(),
        }
    }

    async fn submit(&self, record: &CanonicalRecord, attempt: u32) -> Result<(), DeliveryError> {
        match self {
            Self::Http(endpoint) => endpoint.submit(record, attempt).await,
            Self::Log(endpoint) => endpoint.submit(record, attempt).await,
        }
    }

    async fn submit_batch(&self, records: &[CanonicalRecord]) -> Result<(), DeliveryError> {
        match self {
            Self::Http(endpoint) => endpoint.submit_batch(records).await,
            Self::Log(endpoint) => endpoint.submit_batch(records).await,
        }
    }
}

/// Build the endpoint described by `config`.
pub fn create_endpoint(config: &EndpointConfig) -> Result<AnyEndpoint, DispatcherError> {
    let endpoint: AnyEndpoint = match config.kind {
        EndpointKind::Http => HttpEndpoint::new(config)?.into(),
        EndpointKind::Log => LogEndpoint::new(&config.name).into(),
    };
    info!(endpoint = %config.name, kind = ?endpoint.kind(), "endpoint created");
    Ok(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_endpoint_by_kind() {
        let log = create_endpoint(&EndpointConfig::log("dry")).unwrap();
        assert_eq!(log.kind(), EndpointKind::Log);
        assert_eq!(log.name(), "dry");

        let http = create_endpoint(&EndpointConfig::http("https://example.com/customers")).unwrap();
        assert_eq!(http.kind(), EndpointKind::Http);
        assert_eq!(http.name(), "collector");
    }

    #[test]
    fn test_create_http_without_url_fails() {
        let config = EndpointConfig {
            kind: EndpointKind::Http,
            ..EndpointConfig::log("broken")
        };
        assert!(create_endpoint(&config).is_err());
    }

    #[tokio::test]
    async fn test_log_probe_succeeds() {
        let endpoint = create_endpoint(&EndpointConfig::log("dry")).unwrap();
        endpoint.probe().await.unwrap();
    }
}
