//! # Ingestion
//!
//! Turns loosely-structured customer records into canonical ones.
//!
//! Responsibilities:
//! - Load extractor output (JSON record documents) into `RawRecord`s
//! - Normalize email, name, tier and signup date
//! - Validate records and report every rejection with its reasons
//!
//! ## Usage Example
//!
//! ```
//! use contracts::{RawRecord, SubscriptionTier};
//!
//! let raw = RawRecord::new()
//!     .with("Email", "Jane@Example.com")
//!     .with("plan", "premium")
//!     .with("date", "March 3rd, 2024");
//!
//! let record = ingestion::validate(&raw).unwrap();
//! assert_eq!(record.email().as_str(), "jane@example.com");
//! assert_eq!(record.subscription_tier(), SubscriptionTier::Pro);
//! ```

mod document;
mod error;
mod metrics;
pub mod normalize;
mod validator;

// Re-exports
pub use document::{load_records, load_records_from_path};
pub use error::{IngestionError, Result};
pub use metrics::{ValidationMetrics, ValidationMetricsSnapshot};
pub use normalize::{DateNormalizer, DateStrategy, ParseOutcome};
pub use validator::{validate, validate_all, FieldAliases, RecordValidator, ValidationSummary};
