//! Retry delay computation.

use std::time::Duration;

use contracts::DeliveryPolicy;
use rand::Rng;

/// Upper bound of the jitter, as a fraction of the exponential delay
const MAX_JITTER: f64 = 0.25;

/// Delay before the next attempt after the `failed_attempt`-th failure.
///
/// Never shorter than the policy's exponential schedule; with jitter enabled
/// up to 25% is added on top.
pub fn retry_delay(policy: &DeliveryPolicy, failed_attempt: u32) -> Duration {
    let floor = policy.backoff_delay(failed_attempt);
    if !policy.jitter() || floor.is_zero() {
        return floor;
    }

    let factor = rand::rng().random_range(0.0..=MAX_JITTER);
    floor.saturating_add(floor.mul_f64(factor))
}
