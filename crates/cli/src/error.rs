//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Records file not found
    #[error("Input file not found: {path}")]
    InputNotFound { path: String },

    /// Some input records were rejected during validation
    #[error("{rejected} of {total} record(s) failed validation")]
    InvalidRecords { rejected: usize, total: usize },

    /// The run finished with undelivered records
    #[error("{failed} of {total} record(s) were not delivered")]
    DeliveryIncomplete { failed: usize, total: usize },

    /// Connection test failed
    #[error("Endpoint '{endpoint}' failed the connection test: {message}")]
    ProbeFailed { endpoint: String, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn input_not_found(path: impl Into<String>) -> Self {
        Self::InputNotFound { path: path.into() }
    }

    pub fn probe_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProbeFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}
