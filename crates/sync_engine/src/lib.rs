//! # Sync Engine
//!
//! Resilient delivery of canonical records to a remote endpoint.
//!
//! Responsibilities:
//! - bounded retries with exponential backoff
//! - a concurrency ceiling and a rolling-window rate limit
//! - batch fallback once consecutive failures pass a threshold
//! - cooperative cancellation through a `CancellationToken`
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sync_engine::{MockEndpoint, SyncEngine};
//!
//! let engine = SyncEngine::new(Arc::new(MockEndpoint::accepting()), policy);
//! let report = engine.deliver(records, cancel.clone()).await?;
//! println!("{} delivered, {} failed", report.delivered, report.failed);
//! ```

mod backoff;
mod batch;
mod engine;
mod error;
mod gate;
pub mod mock;
mod tracker;

pub use backoff::retry_delay;
pub use contracts::{DeliveryPolicy, RateLimit, SyncReport};
pub use engine::SyncEngine;
pub use error::SyncError;
pub use gate::RollingWindowLimiter;
pub use mock::{MockCall, MockEndpoint};
pub use tokio_util::sync::CancellationToken;
pub use tracker::FailureTracker;
