//! DeliveryPolicy - retry, concurrency, rate-limit and fallback settings
//!
//! The policy is a plain decision object: it owns no runtime state and is
//! shared read-only by every delivery worker.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::{ContractError, DeliveryError};

/// Rolling-window rate limit: at most `max_requests` within any `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(1),
        }
    }
}

/// Immutable delivery policy. Build it with [`DeliveryPolicy::builder`].
///
/// # Example
/// ```
/// use contracts::{DeliveryPolicy, RateLimit};
/// use std::time::Duration;
///
/// let policy = DeliveryPolicy::builder()
///     .max_retries(3)
///     .base_backoff(Duration::from_millis(100))
///     .backoff_multiplier(2.0)
///     .max_concurrency(8)
///     .rate_limit(RateLimit::new(50, Duration::from_secs(1)))
///     .build()
///     .unwrap();
///
/// assert_eq!(policy.max_attempts(), 4);
/// assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPolicy {
    max_retries: u32,
    base_backoff: Duration,
    backoff_multiplier: f64,
    max_concurrency: usize,
    rate_limit: RateLimit,
    batch_fallback_threshold: u32,
    batch_size: usize,
    jitter: bool,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_concurrency: 4,
            rate_limit: RateLimit::default(),
            batch_fallback_threshold: 5,
            batch_size: 50,
            jitter: false,
        }
    }
}

impl DeliveryPolicy {
    /// Start from the defaults.
    pub fn builder() -> DeliveryPolicyBuilder {
        DeliveryPolicyBuilder {
            policy: Self::default(),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Individual attempts allowed per record (first try plus retries).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn base_backoff(&self) -> Duration {
        self.base_backoff
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn rate_limit(&self) -> RateLimit {
        self.rate_limit
    }

    /// Consecutive failed attempts that switch the run to batch mode (0 = never).
    pub fn batch_fallback_threshold(&self) -> u32 {
        self.batch_fallback_threshold
    }

    pub fn batch_fallback_enabled(&self) -> bool {
        self.batch_fallback_threshold > 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Minimum wait after the `failed_attempt`-th attempt failed (1-based):
    /// `base_backoff * multiplier^(failed_attempt - 1)`.
    pub fn backoff_delay(&self, failed_attempt: u32) -> Duration {
        if failed_attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(failed_attempt - 1).unwrap_or(i32::MAX);
        let secs = self.base_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Whether a record whose `failed_attempt`-th attempt ended with `error`
    /// gets another individual attempt.
    pub fn should_retry(&self, failed_attempt: u32, error: &DeliveryError) -> bool {
        error.is_retryable() && failed_attempt < self.max_attempts()
    }
}

/// Builder for [`DeliveryPolicy`]; `build` enforces the invariants.
#[derive(Debug, Clone)]
pub struct DeliveryPolicyBuilder {
    policy: DeliveryPolicy,
}

impl DeliveryPolicyBuilder {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    pub fn base_backoff(mut self, base_backoff: Duration) -> Self {
        self.policy.base_backoff = base_backoff;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.policy.backoff_multiplier = multiplier;
        self
    }

    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.policy.max_concurrency = max_concurrency;
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.policy.rate_limit = rate_limit;
        self
    }

    pub fn batch_fallback_threshold(mut self, threshold: u32) -> Self {
        self.policy.batch_fallback_threshold = threshold;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.policy.batch_size = batch_size;
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.policy.jitter = jitter;
        self
    }

    /// Validate and freeze the policy.
    ///
    /// # Errors
    /// `ContractError::ConfigValidation` naming the offending option.
    pub fn build(self) -> Result<DeliveryPolicy, ContractError> {
        let p = self.policy;

        if p.base_backoff.is_zero() {
            return Err(ContractError::config_validation(
                "delivery.base_backoff",
                "base_backoff must be > 0",
            ));
        }
        if !(p.backoff_multiplier.is_finite() && p.backoff_multiplier > 1.0) {
            return Err(ContractError::config_validation(
                "delivery.backoff_multiplier",
                format!("backoff_multiplier must be > 1.0, got {}", p.backoff_multiplier),
            ));
        }
        if p.max_concurrency == 0 {
            return Err(ContractError::config_validation(
                "delivery.max_concurrency",
                "max_concurrency must be >= 1",
            ));
        }
        if p.rate_limit.max_requests == 0 || p.rate_limit.window.is_zero() {
            return Err(ContractError::config_validation(
                "delivery.rate_limit",
                "rate limit needs at least one request per non-empty window",
            ));
        }
        if p.batch_size == 0 {
            return Err(ContractError::config_validation(
                "delivery.batch_size",
                "batch_size must be >= 1",
            ));
        }

        Ok(p)
    }
}

/// Serde-friendly form of the policy, as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DeliveryPolicyConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_backoff_ms")]
    #[validate(range(min = 1))]
    pub base_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    #[validate(range(exclusive_min = 1.0))]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_concurrency")]
    #[validate(range(min = 1))]
    pub max_concurrency: usize,

    #[serde(default = "default_rate_limit_requests")]
    #[validate(range(min = 1))]
    pub rate_limit_requests: u32,

    #[serde(default = "default_rate_limit_window_ms")]
    #[validate(range(min = 1))]
    pub rate_limit_window_ms: u64,

    #[serde(default = "default_batch_fallback_threshold")]
    pub batch_fallback_threshold: u32,

    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,

    #[serde(default)]
    pub jitter: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_concurrency() -> usize {
    4
}

fn default_rate_limit_requests() -> u32 {
    10
}

fn default_rate_limit_window_ms() -> u64 {
    1000
}

fn default_batch_fallback_threshold() -> u32 {
    5
}

fn default_batch_size() -> usize {
    50
}

impl Default for DeliveryPolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_concurrency: default_max_concurrency(),
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_ms: default_rate_limit_window_ms(),
            batch_fallback_threshold: default_batch_fallback_threshold(),
            batch_size: default_batch_size(),
            jitter: false,
        }
    }
}

impl TryFrom<&DeliveryPolicyConfig> for DeliveryPolicy {
    type Error = ContractError;

    fn try_from(config: &DeliveryPolicyConfig) -> Result<Self, Self::Error> {
        DeliveryPolicy::builder()
            .max_retries(config.max_retries)
            .base_backoff(Duration::from_millis(config.base_backoff_ms))
            .backoff_multiplier(config.backoff_multiplier)
            .max_concurrency(config.max_concurrency)
            .rate_limit(RateLimit::new(
                config.rate_limit_requests,
                Duration::from_millis(config.rate_limit_window_ms),
            ))
            .batch_fallback_threshold(config.batch_fallback_threshold)
            .batch_size(config.batch_size)
            .jitter(config.jitter)
            .build()
    }
}
