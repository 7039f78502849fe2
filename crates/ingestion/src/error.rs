//! Ingestion error types

use std::path::PathBuf;
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Document is not valid JSON
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// An element of the record list is not an object
    #[error("record #{index} is not an object (found {found})")]
    NotAnObject {
        /// Position in the record list
        index: usize,
        /// JSON type that was found instead
        found: &'static str,
    },

    /// Top-level value cannot hold records
    #[error("unsupported document: expected an array or object, found {found}")]
    UnsupportedDocument { found: &'static str },

    /// Failed to read the document
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
