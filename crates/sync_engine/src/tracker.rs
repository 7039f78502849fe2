//! Consecutive-failure tracking for batch fallback.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Counts consecutive failed individual attempts across all records.
///
/// Any success resets the count. Once the count reaches the threshold the
/// tracker engages; engagement is one-way and observed as a transition by
/// exactly one caller.
#[derive(Debug)]
pub struct FailureTracker {
    threshold: u32,
    consecutive: AtomicU32,
    engaged: AtomicBool,
    /// Fired once on engagement, wakes records parked in backoff
    signal: CancellationToken,
}

impl FailureTracker {
    /// `threshold == 0` never engages.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive: AtomicU32::new(0),
            engaged: AtomicBool::new(false),
            signal: CancellationToken::new(),
        }
    }

    pub fn record_success(&self) {
        self.consecutive.store(0, Ordering::Release);
    }

    /// Count a failed attempt. Returns `true` for the one call that engaged
    /// the fallback.
    pub fn record_failure(&self) -> bool {
        let previous = self
            .consecutive
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some(c.saturating_add(1)))
            .unwrap_or_else(|current| current);
        let count = previous.saturating_add(1);

        if self.threshold == 0 || count < self.threshold {
            return false;
        }
        if self.engaged.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.signal.cancel();
        true
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }

    /// Resolves once the fallback has engaged.
    pub fn engaged(&self) -> WaitForCancellationFuture<'_> {
        self.signal.cancelled()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_engages_at_threshold() {
        let tracker = FailureTracker::new(3);
        assert!(!tracker.record_failure());
        assert!(!tracker.record_failure());
        assert!(tracker.record_failure());
        assert!(tracker.is_engaged());

        // stays engaged, never reported twice
        assert!(!tracker.record_failure());
        tracker.record_success();
        assert!(tracker.is_engaged());
    }

    #[tokio::test]
    async fn test_engagement_wakes_waiters() {
        let tracker = Arc::new(FailureTracker::new(2));
        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.engaged().await })
        };

        tracker.record_failure();
        assert!(!waiter.is_finished());
        tracker.record_failure();
        waiter.await.unwrap();

        // already engaged: resolves immediately
        tracker.engaged().await;
    }

    #[test]
    fn test_success_resets_streak() {
        let tracker = FailureTracker::new(3);
        tracker.record_failure();
        tracker.record_failure();
        tracker.record_success();
        assert_eq!(tracker.consecutive_failures(), 0);
        tracker.record_failure();
        tracker.record_failure();
        assert!(!tracker.is_engaged());
    }

    #[test]
    fn test_zero_threshold_never_engages() {
        let tracker = FailureTracker::new(0);
        for _ in 0..100 {
            assert!(!tracker.record_failure());
        }
        assert!(!tracker.is_engaged());
    }

    #[test]
    fn test_threshold_crossed_exactly_once_under_contention() {
        let tracker = Arc::new(FailureTracker::new(50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || (0..100).filter(|_| tracker.record_failure()).count())
            })
            .collect();

        let transitions: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(transitions, 1);
        assert_eq!(tracker.consecutive_failures(), 800);
    }
}
