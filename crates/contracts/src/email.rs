//! Email - validated, lowercased identity of a customer record
//!
//! Uses Arc<str> internally so records can hand their identity to reports and
//! log fields without reallocating.

use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, LazyLock};

/// local-part@domain.tld, evaluated case-insensitively
static EMAIL_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("email grammar is valid")
});

/// Returns true when `candidate` matches the email grammar.
///
/// The check does not depend on letter case, so folding before or after the
/// check yields the same verdict.
pub fn is_valid_email(candidate: &str) -> bool {
    EMAIL_GRAMMAR.is_match(candidate)
}

/// Email address that is guaranteed to be syntactically valid and lowercase.
///
/// The only way to obtain one is [`Email::parse`] (or deserialization, which
/// goes through the same check), so a value of this type always upholds the
/// record identity invariant.
///
/// # Examples
/// ```
/// use contracts::Email;
///
/// let email = Email::parse("  Jane.Doe@Example.COM ").unwrap();
/// assert_eq!(email.as_str(), "jane.doe@example.com");
/// assert!(Email::parse("not-an-email").is_none());
/// ```
#[derive(Clone)]
pub struct Email(Arc<str>);

impl Email {
    /// Trim, validate and lowercase a candidate address.
    pub fn parse(candidate: &str) -> Option<Self> {
        let trimmed = candidate.trim();
        if !is_valid_email(trimmed) {
            return None;
        }
        Some(Self(Arc::from(trimmed.to_lowercase())))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Domain part (after the `@`).
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map(|(_, domain)| domain).unwrap_or("")
    }
}

impl Deref for Email {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Email {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Email {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Email({:?})", self.0)
    }
}

impl PartialEq for Email {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for Email {}

impl PartialEq<str> for Email {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for Email {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl Hash for Email {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for Email {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Email::parse(&s).ok_or_else(|| de::Error::custom(format!("invalid email address: {s}")))
    }
}
