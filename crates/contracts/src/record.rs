//! Record model - raw extractor output and the canonical validated record

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use crate::Email;

/// Loosely-typed field value as produced by an extractor.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawValue {
    /// Free text
    Text(String),
    /// Numeric cell (spreadsheets, JSON numbers)
    Number(f64),
    /// Missing key, JSON null, or an empty cell
    #[default]
    Absent,
}

impl RawValue {
    /// Whether the value carries nothing usable.
    pub fn is_absent(&self) -> bool {
        match self {
            RawValue::Absent => true,
            RawValue::Text(text) => text.trim().is_empty(),
            RawValue::Number(n) => !n.is_finite(),
        }
    }

    /// Text view of the value; integral numbers render without a fraction.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            RawValue::Text(text) => Some(Cow::Borrowed(text.as_str())),
            RawValue::Number(n) if n.is_finite() => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(Cow::Owned(format!("{}", *n as i64)))
                } else {
                    Some(Cow::Owned(n.to_string()))
                }
            }
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Number(n as f64)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Absent)
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => RawValue::Absent,
            Value::String(s) => RawValue::Text(s),
            Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Absent),
            Value::Bool(b) => RawValue::Text(b.to_string()),
            other => RawValue::Text(other.to_string()),
        }
    }
}

/// Unvalidated record: field name -> value.
///
/// Keys are stored trimmed and lowercased so lookups ignore the casing the
/// source happened to use ("Email", " EMAIL ", "email").
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "serde_json::Map<String, serde_json::Value>")]
pub struct RawRecord {
    fields: HashMap<String, RawValue>,
}

impl RawRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a field.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<RawValue>) {
        self.fields.insert(normalize_key(key.as_ref()), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<RawValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a field; missing keys read as [`RawValue::Absent`].
    pub fn get(&self, key: &str) -> &RawValue {
        self.fields.get(&normalize_key(key)).unwrap_or(&ABSENT)
    }

    /// First of `keys` holding a usable value, or [`RawValue::Absent`].
    pub fn first_present<I, K>(&self, keys: I) -> &RawValue
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter()
            .map(|key| self.get(key.as_ref()))
            .find(|value| !value.is_absent())
            .unwrap_or(&ABSENT)
    }

    /// Whether a key is present at all (even with an empty value).
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(&normalize_key(key))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(key, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

static ABSENT: RawValue = RawValue::Absent;

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

impl From<serde_json::Map<String, serde_json::Value>> for RawRecord {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter().collect()
    }
}

impl<K, V> FromIterator<(K, V)> for RawRecord
where
    K: AsRef<str>,
    V: Into<RawValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

/// Canonical subscription tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionTier {
    #[default]
    Basic,
    Pro,
}

impl SubscriptionTier {
    /// Canonical display name
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Basic => "Basic",
            SubscriptionTier::Pro => "Pro",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully normalized customer record, ready for delivery.
///
/// Immutable after construction. Identity is carried by [`Email`], which can
/// only exist in validated form, so a record without identity cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(rename = "customer_name")]
    name: Option<String>,
    email: Email,
    subscription_tier: SubscriptionTier,
    /// Serialized as `YYYY-MM-DD`
    signup_date: Option<NaiveDate>,
}

impl CanonicalRecord {
    /// Assemble a record from already-normalized parts.
    pub fn new(
        email: Email,
        name: Option<String>,
        subscription_tier: SubscriptionTier,
        signup_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            name,
            email,
            subscription_tier,
            signup_date,
        }
    }

    /// Identity used in reports and logs.
    pub fn id(&self) -> &str {
        self.email.as_str()
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn subscription_tier(&self) -> SubscriptionTier {
        self.subscription_tier
    }

    pub fn signup_date(&self) -> Option<NaiveDate> {
        self.signup_date
    }
}
