//! Field Normalization Engine
//!
//! One function per canonical field. Email and date may reject; name and
//! tier always produce a value.

mod date;
mod email;
mod name;
mod tier;

pub use date::{
    normalize_date, strip_ordinals, CompactStrategy, DateNormalizer, DateStrategy,
    FormatStrategy, ParseOutcome, TimestampStrategy, DATE_FIELD, DEFAULT_DATE_FORMATS,
};
pub use email::{normalize_email, EMAIL_FIELD};
pub use name::{normalize_name, MAX_NAME_LEN};
pub use tier::{normalize_tier, TIER_SYNONYMS};
