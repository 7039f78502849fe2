//! # Dispatcher
//!
//! Delivery endpoints for the sync engine.
//!
//! - `HttpEndpoint`: JSON POST with status classification
//! - `LogEndpoint`: accepts everything, for dry runs
//! - `create_endpoint`: picks the kind from `EndpointConfig`

pub mod endpoints;
pub mod error;
pub mod metrics;

pub use contracts::{DeliveryEndpoint, EndpointConfig, EndpointKind};
pub use endpoints::{create_endpoint, AnyEndpoint, HttpEndpoint, LogEndpoint};
pub use error::DispatcherError;
pub use metrics::{EndpointMetrics, MetricsSnapshot};
