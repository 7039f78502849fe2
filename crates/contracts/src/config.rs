//! SyncerConfig - Config Loader output
//!
//! Describes where records go and how hard the engine tries to get them there.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::DeliveryPolicyConfig;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete syncer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SyncerConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Remote collection endpoint
    #[validate(nested)]
    pub endpoint: EndpointConfig,

    /// Retry / concurrency / rate-limit / fallback settings
    #[serde(default)]
    #[validate(nested)]
    pub delivery: DeliveryPolicyConfig,
}

/// Endpoint kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// JSON over HTTP(S)
    #[default]
    Http,
    /// Accept everything, log only (dry runs)
    Log,
}

/// Endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EndpointConfig {
    #[serde(default)]
    pub kind: EndpointKind,

    /// Target for individual records
    #[serde(default)]
    pub url: Option<String>,

    /// Target for fallback batches; falls back to `url`
    #[serde(default)]
    pub batch_url: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    /// Name used in logs and metrics
    #[serde(default = "default_endpoint_name")]
    #[validate(length(min = 1))]
    pub name: String,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_endpoint_name() -> String {
    "collector".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            kind: EndpointKind::default(),
            url: None,
            batch_url: None,
            timeout_ms: default_timeout_ms(),
            name: default_endpoint_name(),
        }
    }
}

impl EndpointConfig {
    /// Log endpoint, no URL required.
    pub fn log(name: impl Into<String>) -> Self {
        Self {
            kind: EndpointKind::Log,
            name: name.into(),
            ..Default::default()
        }
    }

    /// HTTP endpoint posting to `url`.
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            kind: EndpointKind::Http,
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// URL used for batch submissions.
    pub fn effective_batch_url(&self) -> Option<&str> {
        self.batch_url.as_deref().or(self.url.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_defaults_from_json() {
        let config: SyncerConfig =
            serde_json::from_str(r#"{"endpoint": {"url": "http://localhost:9000/in"}}"#).unwrap();

        assert_eq!(config.version, ConfigVersion::V1);
        assert_eq!(config.endpoint.kind, EndpointKind::Http);
        assert_eq!(config.endpoint.timeout_ms, 30_000);
        assert_eq!(
            config.endpoint.effective_batch_url(),
            Some("http://localhost:9000/in")
        );
        assert_eq!(config.delivery, DeliveryPolicyConfig::default());
    }

    #[test]
    fn test_nested_validation() {
        let mut config = SyncerConfig {
            version: ConfigVersion::V1,
            endpoint: EndpointConfig::log("dry"),
            delivery: DeliveryPolicyConfig::default(),
        };
        assert!(config.validate().is_ok());

        config.delivery.max_concurrency = 0;
        assert!(config.validate().is_err());
    }
}
