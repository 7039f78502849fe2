//! # Contracts
//!
//! Shared interface contracts: record model, delivery policy, endpoint trait
//! and run outcomes. Every other crate depends on this one, never the reverse.
//!
//! ## Record lifecycle
//! `RawRecord` -> (validation) -> `CanonicalRecord` -> (delivery) -> `SyncReport`

mod config;
mod email;
mod endpoint;
mod error;
mod outcome;
mod policy;
mod record;
mod rejection;

pub use config::*;
pub use email::{is_valid_email, Email};
pub use endpoint::{DeliveryEndpoint, DeliveryError, LocalDeliveryEndpoint};
pub use error::*;
pub use outcome::*;
pub use policy::*;
pub use record::*;
pub use rejection::*;
