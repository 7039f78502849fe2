//! Admission gates: concurrency permits and the rolling-window rate limit.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use contracts::RateLimit;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Wait for a concurrency permit.
///
/// Returns `None` if the run is cancelled first.
pub(crate) async fn acquire_permit(
    semaphore: &Arc<Semaphore>,
    cancel: &CancellationToken,
) -> Option<OwnedSemaphorePermit> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        permit = semaphore.clone().acquire_owned() => permit.ok(),
    }
}

/// Sliding-log rate limiter: at most `max_requests` admissions within any
/// trailing `window`.
///
/// The log holds the instants of recent admissions; entries older than the
/// window are evicted on every check.
#[derive(Debug)]
pub struct RollingWindowLimiter {
    max_requests: usize,
    window: Duration,
    admissions: Mutex<VecDeque<Instant>>,
}

impl RollingWindowLimiter {
    pub fn new(limit: RateLimit) -> Self {
        let max_requests = usize::try_from(limit.max_requests).unwrap_or(usize::MAX).max(1);
        Self {
            max_requests,
            window: limit.window,
            admissions: Mutex::new(VecDeque::with_capacity(max_requests.min(1024))),
        }
    }

    /// Admit one request now, or report how long until a slot frees up.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut admissions = self.admissions.lock().unwrap_or_else(PoisonError::into_inner);

        while let Some(oldest) = admissions.front() {
            if now.duration_since(*oldest) >= self.window {
                admissions.pop_front();
            } else {
                break;
            }
        }

        if admissions.len() < self.max_requests {
            admissions.push_back(now);
            return Ok(());
        }

        let oldest = admissions.front().copied().unwrap_or(now);
        Err(self.window.saturating_sub(now.duration_since(oldest)))
    }

    /// Wait until a request is admitted. Returns `false` if cancelled first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> bool {
        loop {
            let wait = match self.try_acquire() {
                Ok(()) => return true,
                Err(wait) => wait,
            };
            trace!(wait_ms = wait.as_millis() as u64, "rate limited");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Admissions currently inside the window.
    pub fn in_window(&self) -> usize {
        let now = Instant::now();
        self.admissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|at| now.duration_since(**at) < self.window)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_ms: u64) -> RollingWindowLimiter {
        RollingWindowLimiter::new(RateLimit::new(max, Duration::from_millis(window_ms)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_within_window() {
        let limiter = limiter(3, 1000);
        for _ in 0..3 {
            assert!(limiter.try_acquire().is_ok());
        }
        let wait = limiter.try_acquire().unwrap_err();
        assert_eq!(wait, Duration::from_millis(1000));

        tokio::time::advance(Duration::from_millis(400)).await;
        assert_eq!(limiter.try_acquire().unwrap_err(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_rolls() {
        let limiter = limiter(2, 100);
        assert!(limiter.try_acquire().is_ok());
        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_err());

        // first admission leaves the window, second is still inside
        tokio::time::advance(Duration::from_millis(40)).await;
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_err());
        assert_eq!(limiter.in_window(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_slot() {
        let limiter = limiter(1, 500);
        let cancel = CancellationToken::new();
        let start = Instant::now();

        assert!(limiter.acquire(&cancel).await);
        assert!(limiter.acquire(&cancel).await);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_aborts_on_cancel() {
        let limiter = limiter(1, 60_000);
        let cancel = CancellationToken::new();
        assert!(limiter.acquire(&cancel).await);

        cancel.cancel();
        assert!(!limiter.acquire(&cancel).await);
    }

    #[tokio::test]
    async fn test_permit_respects_cancel() {
        let semaphore = Arc::new(Semaphore::new(1));
        let cancel = CancellationToken::new();

        let held = acquire_permit(&semaphore, &cancel).await;
        assert!(held.is_some());

        cancel.cancel();
        assert!(acquire_permit(&semaphore, &cancel).await.is_none());
    }
}
