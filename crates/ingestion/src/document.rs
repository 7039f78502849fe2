//! JSON record documents
//!
//! Extractors hand over their output as JSON. Accepted shapes:
//! - `[{...}, {...}]`
//! - `{"customers": [...]}` or `{"data": [...]}`
//! - a single `{...}` record

use contracts::RawRecord;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, instrument};

use crate::error::{IngestionError, Result};

/// Keys that wrap the record list in an envelope object
const ENVELOPE_KEYS: &[&str] = &["customers", "data"];

/// Parse a record document.
pub fn load_records(content: &str) -> Result<Vec<RawRecord>> {
    let document: Value = serde_json::from_str(content)?;

    let records = match document {
        Value::Array(items) => records_from_array(items)?,
        Value::Object(mut object) => {
            let envelope = ENVELOPE_KEYS
                .iter()
                .find(|key| matches!(object.get(**key), Some(Value::Array(_))));
            match envelope.and_then(|key| object.remove(*key)) {
                Some(Value::Array(items)) => records_from_array(items)?,
                _ => vec![RawRecord::from(object)],
            }
        }
        other => {
            return Err(IngestionError::UnsupportedDocument {
                found: json_type(&other),
            })
        }
    };

    debug!(count = records.len(), "record document parsed");
    Ok(records)
}

/// Read and parse a record document from disk.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_records_from_path(path: &Path) -> Result<Vec<RawRecord>> {
    let content = std::fs::read_to_string(path).map_err(|source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_records(&content)
}

fn records_from_array(items: Vec<Value>) -> Result<Vec<RawRecord>> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(object) => Ok(RawRecord::from(object)),
            other => Err(IngestionError::NotAnObject {
                index,
                found: json_type(&other),
            }),
        })
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
