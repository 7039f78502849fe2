//! Record Validator
//!
//! Runs every field normalizer over a raw record, collects all failures and
//! either assembles a `CanonicalRecord` or returns a `RejectionError`.

use contracts::{CanonicalRecord, RawRecord, RejectionError};
use metrics::counter;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use crate::metrics::ValidationMetrics;
use crate::normalize::{normalize_email, normalize_name, normalize_tier, DateNormalizer};

/// Source column names accepted for each canonical field.
///
/// Lookup is case-insensitive; the first alias holding a non-empty value wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAliases {
    pub email: Vec<String>,
    pub name: Vec<String>,
    pub tier: Vec<String>,
    pub date: Vec<String>,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            email: owned(&["email", "email_address", "mail", "contact_email"]),
            name: owned(&[
                "customer_name",
                "name",
                "customer",
                "client_name",
                "fullname",
                "full_name",
            ]),
            tier: owned(&["subscription_tier", "tier", "subscription", "plan", "level"]),
            date: owned(&[
                "signup_date",
                "date",
                "join_date",
                "created",
                "registration_date",
            ]),
        }
    }
}

/// Result of validating a batch of raw records.
#[derive(Debug, Clone, Default)]
pub struct ValidationSummary {
    /// Canonical records, in input order
    pub accepted: Vec<CanonicalRecord>,
    /// `(input index, rejection)` pairs, in input order
    pub rejected: Vec<(usize, RejectionError)>,
}

impl ValidationSummary {
    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }

    /// Share of accepted records in percent (0 for an empty batch).
    pub fn acceptance_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.accepted.len() as f64 / total as f64 * 100.0,
        }
    }
}

/// Turns raw records into canonical ones.
///
/// Holds no per-record state; share it freely across threads.
#[derive(Debug, Clone, Default)]
pub struct RecordValidator {
    aliases: FieldAliases,
    dates: DateNormalizer,
    metrics: Arc<ValidationMetrics>,
}

impl RecordValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aliases(mut self, aliases: FieldAliases) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_date_normalizer(mut self, dates: DateNormalizer) -> Self {
        self.dates = dates;
        self
    }

    pub fn metrics(&self) -> &Arc<ValidationMetrics> {
        &self.metrics
    }

    /// Validate one record.
    ///
    /// Every field is checked even after a failure so the rejection lists
    /// all offending fields; its primary reason is the first failure in
    /// field order (email, name, tier, date).
    pub fn validate(&self, raw: &RawRecord) -> Result<CanonicalRecord, RejectionError> {
        let aliases = &self.aliases;

        let email = normalize_email(raw.first_present(&aliases.email));
        let name = normalize_name(raw.first_present(&aliases.name));
        let tier = normalize_tier(raw.first_present(&aliases.tier));
        let signup_date = self.dates.normalize(raw.first_present(&aliases.date));

        let rejection = match (email, signup_date) {
            (Ok(email), Ok(signup_date)) => {
                self.metrics.record_accepted();
                counter!("record_syncer_records_accepted_total").increment(1);
                debug!(email = %email, tier = %tier, "record accepted");
                return Ok(CanonicalRecord::new(email, name, tier, signup_date));
            }
            (Err(first), signup_date) => RejectionError::new(first).with_failures(signup_date.err()),
            (Ok(_), Err(first)) => RejectionError::new(first),
        };

        self.metrics.record_rejected(rejection.reason);
        counter!("record_syncer_records_rejected_total", "reason" => rejection.reason.as_str())
            .increment(1);
        warn!(
            reason = %rejection.reason,
            fields = ?rejection.fields(),
            details = %rejection,
            "record rejected"
        );
        Err(rejection)
    }

    /// Validate a batch; one bad record never affects the others.
    pub fn validate_all<'a, I>(&self, records: I) -> ValidationSummary
    where
        I: IntoIterator<Item = &'a RawRecord>,
    {
        let mut summary = ValidationSummary::default();
        for (index, raw) in records.into_iter().enumerate() {
            match self.validate(raw) {
                Ok(record) => summary.accepted.push(record),
                Err(rejection) => summary.rejected.push((index, rejection)),
            }
        }

        debug!(
            accepted = summary.accepted.len(),
            rejected = summary.rejected.len(),
            "batch validated"
        );
        summary
    }
}

static DEFAULT_VALIDATOR: LazyLock<RecordValidator> = LazyLock::new(RecordValidator::default);

/// Validate with the default aliases and date strategies.
pub fn validate(raw: &RawRecord) -> Result<CanonicalRecord, RejectionError> {
    DEFAULT_VALIDATOR.validate(raw)
}

/// Batch form of [`validate`].
pub fn validate_all<'a, I>(records: I) -> ValidationSummary
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    DEFAULT_VALIDATOR.validate_all(records)
}
