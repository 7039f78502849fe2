//! Signup date normalizer
//!
//! Dates arrive in whatever shape the source used. Each known shape is an
//! independent [`DateStrategy`]; the normalizer strips ordinal suffixes and
//! then tries the strategies in order, keeping the first match.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use contracts::{FieldFailure, RawValue, RejectionReason};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::trace;

/// Canonical field name
pub const DATE_FIELD: &str = "signup_date";

/// Result of a single strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(NaiveDate),
    NotMatched,
}

impl ParseOutcome {
    pub fn parsed(self) -> Option<NaiveDate> {
        match self {
            ParseOutcome::Parsed(date) => Some(date),
            ParseOutcome::NotMatched => None,
        }
    }
}

impl From<Option<NaiveDate>> for ParseOutcome {
    fn from(date: Option<NaiveDate>) -> Self {
        date.map_or(ParseOutcome::NotMatched, ParseOutcome::Parsed)
    }
}

/// One way of reading a date string.
///
/// Strategies are stateless and must not panic on arbitrary input.
pub trait DateStrategy: Send + Sync {
    /// Short label for tracing
    fn name(&self) -> &str;

    fn parse(&self, input: &str) -> ParseOutcome;
}

/// chrono format string strategy.
///
/// Formats containing `%Y` only accept four-digit years, so `"5 Jan 24"` is
/// left to a `%y` strategy instead of becoming year 24.
#[derive(Debug, Clone, Copy)]
pub struct FormatStrategy {
    format: &'static str,
}

impl FormatStrategy {
    pub const fn new(format: &'static str) -> Self {
        Self { format }
    }
}

impl DateStrategy for FormatStrategy {
    fn name(&self) -> &str {
        self.format
    }

    fn parse(&self, input: &str) -> ParseOutcome {
        let Ok(date) = NaiveDate::parse_from_str(input, self.format) else {
            return ParseOutcome::NotMatched;
        };
        if self.format.contains("%Y") && date.year() < 1000 {
            return ParseOutcome::NotMatched;
        }
        ParseOutcome::Parsed(date)
    }
}

/// Eight-digit `YYYYMMDD`, also what integer cells such as `20240105` become.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactStrategy;

impl DateStrategy for CompactStrategy {
    fn name(&self) -> &str {
        "YYYYMMDD"
    }

    fn parse(&self, input: &str) -> ParseOutcome {
        if input.len() != 8 || !input.bytes().all(|b| b.is_ascii_digit()) {
            return ParseOutcome::NotMatched;
        }
        let (Ok(year), Ok(month), Ok(day)) = (
            input[0..4].parse::<i32>(),
            input[4..6].parse::<u32>(),
            input[6..8].parse::<u32>(),
        ) else {
            return ParseOutcome::NotMatched;
        };
        NaiveDate::from_ymd_opt(year, month, day).into()
    }
}

/// Full timestamps; only the date part is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampStrategy;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

impl DateStrategy for TimestampStrategy {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn parse(&self, input: &str) -> ParseOutcome {
        if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
            return ParseOutcome::Parsed(ts.date_naive());
        }
        TIMESTAMP_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
            .map(|ts| ts.date())
            .into()
    }
}

/// Built-in format list, in priority order.
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B %y",
    "%B %d %y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%m-%d-%Y",
    "%Y.%m.%d",
    "%d.%m.%Y",
];

static ORDINAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("ordinal pattern is valid")
});

fn ordinal_suffix(n: u32) -> &'static str {
    match (n % 100, n % 10) {
        (11..=13, _) => "th",
        (_, 1) => "st",
        (_, 2) => "nd",
        (_, 3) => "rd",
        _ => "th",
    }
}

/// Drop correct ordinal suffixes ("1st" -> "1"); wrong ones ("1th") stay.
pub fn strip_ordinals(input: &str) -> Cow<'_, str> {
    ORDINAL.replace_all(input, |caps: &Captures<'_>| {
        let digits = &caps[1];
        let correct = digits
            .parse::<u32>()
            .map(|n| ordinal_suffix(n).eq_ignore_ascii_case(&caps[2]))
            .unwrap_or(false);
        if correct {
            digits.to_string()
        } else {
            caps[0].to_string()
        }
    })
}

/// Ordered collection of date strategies.
#[derive(Clone)]
pub struct DateNormalizer {
    strategies: Vec<Arc<dyn DateStrategy>>,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        let mut strategies: Vec<Arc<dyn DateStrategy>> = DEFAULT_DATE_FORMATS
            .iter()
            .map(|format| Arc::new(FormatStrategy::new(*format)) as Arc<dyn DateStrategy>)
            .collect();
        strategies.push(Arc::new(CompactStrategy));
        strategies.push(Arc::new(TimestampStrategy));
        Self { strategies }
    }
}

impl fmt::Debug for DateNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

impl DateNormalizer {
    /// Normalizer with a caller-chosen strategy list.
    pub fn with_strategies(strategies: Vec<Arc<dyn DateStrategy>>) -> Self {
        Self { strategies }
    }

    /// Append a strategy with the lowest priority.
    pub fn push(&mut self, strategy: impl DateStrategy + 'static) {
        self.strategies.push(Arc::new(strategy));
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// First strategy match for `input`, after ordinal stripping.
    pub fn parse_str(&self, input: &str) -> Option<NaiveDate> {
        let cleaned = strip_ordinals(input.trim());
        self.strategies.iter().find_map(|strategy| {
            let date = strategy.parse(&cleaned).parsed()?;
            trace!(input, strategy = strategy.name(), %date, "date matched");
            Some(date)
        })
    }

    /// Normalize the raw date field. Absent input is `Ok(None)`.
    pub fn normalize(&self, value: &RawValue) -> Result<Option<NaiveDate>, FieldFailure> {
        if value.is_absent() {
            return Ok(None);
        }
        let text = value.as_text().unwrap_or_default();
        self.parse_str(&text).map(Some).ok_or_else(|| {
            FieldFailure::new(
                DATE_FIELD,
                RejectionReason::InvalidDate,
                format!("unrecognized date '{}'", text.trim()),
            )
        })
    }
}

/// Normalize with the built-in strategy list.
pub fn normalize_date(value: &RawValue) -> Result<Option<NaiveDate>, FieldFailure> {
    static DEFAULT: LazyLock<DateNormalizer> = LazyLock::new(DateNormalizer::default);
    DEFAULT.normalize(value)
}
