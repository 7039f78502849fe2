//! Dispatcher error types

use thiserror::Error;

/// Endpoint construction errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Endpoint settings are unusable
    #[error("invalid configuration for endpoint '{name}': {message}")]
    InvalidConfig { name: String, message: String },

    /// HTTP client could not be built
    #[error("failed to create HTTP client for endpoint '{name}': {source}")]
    Client {
        name: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    pub fn invalid_config(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            name: name.into(),
            message: message.into(),
        }
    }
}
