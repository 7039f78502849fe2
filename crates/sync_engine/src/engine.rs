//! Delivery run orchestration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{
    CanonicalRecord, DeliveryEndpoint, DeliveryOutcome, DeliveryPolicy, FailureReason,
    RecordOutcome, SyncReport,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backoff::retry_delay;
use crate::batch::{self, DeferredRecord};
use crate::error::SyncError;
use crate::gate::{self, RollingWindowLimiter};
use crate::tracker::FailureTracker;

/// Shared state of one `deliver` call.
pub(crate) struct Run<E> {
    pub endpoint: Arc<E>,
    pub policy: Arc<DeliveryPolicy>,
    pub semaphore: Arc<Semaphore>,
    pub limiter: RollingWindowLimiter,
    pub tracker: FailureTracker,
    pub cancel: CancellationToken,
    /// Requests sent, individual and batch
    pub attempts: AtomicU64,
}

impl<E> Run<E> {
    fn new(endpoint: Arc<E>, policy: Arc<DeliveryPolicy>, cancel: CancellationToken) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(policy.max_concurrency())),
            limiter: RollingWindowLimiter::new(policy.rate_limit()),
            tracker: FailureTracker::new(policy.batch_fallback_threshold()),
            attempts: AtomicU64::new(0),
            endpoint,
            policy,
            cancel,
        }
    }
}

/// Where a record ended up after individual delivery.
enum Step {
    Finished {
        index: usize,
        outcome: DeliveryOutcome,
    },
    Deferred(DeferredRecord),
}

impl Step {
    fn failed(index: usize, reason: FailureReason, attempts: u32, detail: impl Into<String>) -> Self {
        Self::Finished {
            index,
            outcome: DeliveryOutcome::failed(reason, attempts, detail),
        }
    }

    fn cancelled(index: usize, attempts: u32) -> Self {
        Self::failed(index, FailureReason::Cancelled, attempts, "run cancelled")
    }
}

fn cancelled(attempts: u32) -> DeliveryOutcome {
    DeliveryOutcome::failed(FailureReason::Cancelled, attempts, "run cancelled")
}

/// Resilient delivery of canonical records to one endpoint.
///
/// Each record is retried with exponential backoff while concurrency and
/// request rate stay within the policy. When consecutive failures reach the
/// fallback threshold, the remaining records are sent in batches once
/// individual delivery drains.
#[derive(Debug)]
pub struct SyncEngine<E> {
    endpoint: Arc<E>,
    policy: Arc<DeliveryPolicy>,
}

impl<E> Clone for SyncEngine<E> {
    fn clone(&self) -> Self {
        Self {
            endpoint: Arc::clone(&self.endpoint),
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<E> SyncEngine<E>
where
    E: DeliveryEndpoint + Sync + 'static,
{
    pub fn new(endpoint: Arc<E>, policy: DeliveryPolicy) -> Self {
        Self {
            endpoint,
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    pub fn endpoint(&self) -> &Arc<E> {
        &self.endpoint
    }

    /// Deliver `records` without external cancellation.
    pub async fn deliver_all(&self, records: Vec<CanonicalRecord>) -> Result<SyncReport, SyncError> {
        self.deliver(records, CancellationToken::new()).await
    }

    /// Deliver `records` and report one outcome per record, in input order.
    ///
    /// Cancelling `cancel` stops new requests from starting; in-flight
    /// requests complete and every unresolved record is reported as
    /// cancelled.
    ///
    /// # Errors
    /// [`SyncError::EndpointUnreachable`] when the fallback engaged, every
    /// batch failed at the transport level and nothing was delivered.
    #[instrument(
        skip_all,
        fields(endpoint = %self.endpoint.name(), records = records.len())
    )]
    pub async fn deliver(
        &self,
        records: Vec<CanonicalRecord>,
        cancel: CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let ids: Vec<String> = records.iter().map(|r| r.id().to_string()).collect();
        let mut outcomes = vec![DeliveryOutcome::Pending; records.len()];

        let run = Arc::new(Run::new(
            Arc::clone(&self.endpoint),
            Arc::clone(&self.policy),
            cancel,
        ));
        let mut tasks = JoinSet::new();
        let mut deferred = Vec::new();
        let mut queue = records.into_iter().enumerate();

        while let Some((index, record)) = queue.next() {
            if run.tracker.is_engaged() {
                deferred.push(DeferredRecord::new(index, record, 0));
                continue;
            }
            let Some(permit) = gate::acquire_permit(&run.semaphore, &run.cancel).await else {
                outcomes[index] = cancelled(0);
                break;
            };
            if run.tracker.is_engaged() {
                drop(permit);
                deferred.push(DeferredRecord::new(index, record, 0));
                continue;
            }
            tasks.spawn(drive_record(Arc::clone(&run), index, record, permit));
        }
        for (index, _) in queue {
            outcomes[index] = cancelled(0);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined? {
                Step::Finished { index, outcome } => outcomes[index] = outcome,
                Step::Deferred(record) => deferred.push(record),
            }
        }

        let batches = if deferred.is_empty() {
            batch::BatchSummary::default()
        } else {
            batch::submit_deferred(&run, deferred, &mut outcomes).await
        };

        let outcomes: Vec<RecordOutcome> = ids
            .into_iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (record_id, outcome))| RecordOutcome {
                index,
                record_id,
                outcome: match outcome {
                    DeliveryOutcome::Pending => cancelled(0),
                    resolved => resolved,
                },
            })
            .collect();

        let engaged = run.tracker.is_engaged();
        let report = SyncReport::from_outcomes(
            outcomes,
            started.elapsed(),
            engaged,
            run.attempts.load(Ordering::Relaxed),
            batches.submitted,
        );

        info!(
            delivered = report.delivered,
            failed = report.failed,
            attempts = report.total_attempts,
            batches = report.batches_submitted,
            fallback = report.batch_fallback_engaged,
            duration_ms = report.duration.as_millis() as u64,
            "delivery run finished"
        );
        observability::record_sync_report(self.endpoint.name(), &report);

        if engaged && batches.all_unreachable() && report.delivered == 0 {
            warn!(failed = report.failed, "endpoint unreachable, batch fallback exhausted");
            return Err(SyncError::unreachable(report));
        }
        Ok(report)
    }
}

/// Individual delivery of one record: attempt, back off, retry.
async fn drive_record<E>(
    run: Arc<Run<E>>,
    index: usize,
    record: CanonicalRecord,
    permit: OwnedSemaphorePermit,
) -> Step
where
    E: DeliveryEndpoint + Sync,
{
    let name = run.endpoint.name();
    let mut permit = Some(permit);
    let mut attempts: u32 = 0;

    loop {
        let held = match permit.take() {
            Some(held) => held,
            None => match gate::acquire_permit(&run.semaphore, &run.cancel).await {
                Some(held) => held,
                None => return Step::cancelled(index, attempts),
            },
        };
        if run.tracker.is_engaged() {
            return Step::Deferred(DeferredRecord::new(index, record, attempts));
        }
        if !run.limiter.acquire(&run.cancel).await || run.cancel.is_cancelled() {
            return Step::cancelled(index, attempts);
        }
        if run.tracker.is_engaged() {
            return Step::Deferred(DeferredRecord::new(index, record, attempts));
        }

        attempts += 1;
        run.attempts.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let result = run.endpoint.submit(&record, attempts).await;
        drop(held);

        let error = match result {
            Ok(()) => {
                run.tracker.record_success();
                observability::record_delivery_attempt(name, "success", started.elapsed());
                return Step::Finished {
                    index,
                    outcome: DeliveryOutcome::Delivered {
                        attempts,
                        via_batch: false,
                    },
                };
            }
            Err(error) => error,
        };

        observability::record_delivery_attempt(name, error.kind(), started.elapsed());
        if run.tracker.record_failure() {
            warn!(
                threshold = run.policy.batch_fallback_threshold(),
                "consecutive failure threshold reached, switching to batch fallback"
            );
            observability::record_fallback_engaged(name);
        }

        if !error.is_retryable() {
            debug!(record = record.id(), attempts, %error, "non-retryable failure");
            return Step::failed(
                index,
                FailureReason::NonRetryableDeliveryFailure,
                attempts,
                error.to_string(),
            );
        }
        if !run.policy.should_retry(attempts, &error) {
            debug!(record = record.id(), attempts, %error, "retries exhausted");
            return Step::failed(
                index,
                FailureReason::RetryableDeliveryFailure,
                attempts,
                error.to_string(),
            );
        }
        if run.tracker.is_engaged() {
            return Step::Deferred(DeferredRecord::new(index, record, attempts));
        }

        let delay = retry_delay(&run.policy, attempts);
        debug!(
            record = record.id(),
            attempts,
            delay_ms = delay.as_millis() as u64,
            %error,
            "retrying"
        );
        tokio::select! {
            biased;
            _ = run.cancel.cancelled() => return Step::cancelled(index, attempts),
            _ = run.tracker.engaged() => {
                return Step::Deferred(DeferredRecord::new(index, record, attempts));
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use contracts::{DeliveryError, Email, RateLimit, SubscriptionTier};

    use crate::mock::MockEndpoint;

    fn records(n: usize) -> Vec<CanonicalRecord> {
        (0..n)
            .map(|i| {
                let email = Email::parse(&format!("user{i}@example.com")).unwrap();
                CanonicalRecord::new(email, None, SubscriptionTier::Basic, None)
            })
            .collect()
    }

    fn policy() -> contracts::DeliveryPolicyBuilder {
        DeliveryPolicy::builder()
            .base_backoff(Duration::from_millis(100))
            .backoff_multiplier(2.0)
            .rate_limit(RateLimit::new(10_000, Duration::from_secs(1)))
            .batch_fallback_threshold(0)
    }

    fn engine(mock: MockEndpoint, policy: DeliveryPolicy) -> (Arc<MockEndpoint>, SyncEngine<MockEndpoint>) {
        let mock = Arc::new(mock);
        (Arc::clone(&mock), SyncEngine::new(mock, policy))
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_every_record() {
        let (mock, engine) = engine(MockEndpoint::accepting(), policy().build().unwrap());

        let report = engine.deliver_all(records(20)).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.delivered, 20);
        assert_eq!(report.total_attempts, 20);
        assert_eq!(mock.calls().len(), 20);
        assert!(!report.batch_fallback_engaged);
        for (i, outcome) in report.outcomes.iter().enumerate() {
            assert_eq!(outcome.index, i);
            assert_eq!(outcome.record_id, format!("user{i}@example.com"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_follow_backoff_schedule() {
        let mock = MockEndpoint::accepting().on_submit(|_, attempt| {
            if attempt <= 3 {
                Err(DeliveryError::retryable(Some(503), "busy"))
            } else {
                Ok(())
            }
        });
        let (mock, engine) = engine(mock, policy().max_retries(5).build().unwrap());

        let report = engine.deliver_all(records(1)).await.unwrap();
        assert_eq!(
            report.outcomes[0].outcome,
            DeliveryOutcome::Delivered {
                attempts: 4,
                via_batch: false
            }
        );

        let times = mock.call_times("user0@example.com");
        assert_eq!(times.len(), 4);
        for (gap, expected_ms) in times.windows(2).zip([100u64, 200, 400]) {
            let elapsed = gap[1].duration_since(gap[0]);
            assert!(elapsed >= Duration::from_millis(expected_ms), "{elapsed:?}");
            assert!(elapsed < Duration::from_millis(expected_ms + 10), "{elapsed:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let mock = MockEndpoint::failing(DeliveryError::retryable(Some(500), "boom"));
        let (mock, engine) = engine(mock, policy().max_retries(2).build().unwrap());

        let report = engine.deliver_all(records(1)).await.unwrap();

        assert_eq!(report.failed, 1);
        let failure = &report.failures[0];
        assert_eq!(failure.reason, FailureReason::RetryableDeliveryFailure);
        assert_eq!(failure.attempts, 3);
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let mock = MockEndpoint::failing(DeliveryError::non_retryable(Some(400), "bad payload"));
        let (mock, engine) = engine(mock, policy().max_retries(5).build().unwrap());

        let report = engine.deliver_all(records(2)).await.unwrap();

        assert_eq!(mock.calls().len(), 2);
        assert_eq!(
            report
                .failures_with(FailureReason::NonRetryableDeliveryFailure)
                .count(),
            2
        );
        assert!(report.failures.iter().all(|f| f.attempts == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_fallback_after_threshold() {
        let mock = MockEndpoint::failing(DeliveryError::retryable(Some(503), "down"));
        let policy = policy()
            .max_concurrency(1)
            .max_retries(10)
            .batch_fallback_threshold(5)
            .batch_size(4)
            .build()
            .unwrap();
        let (mock, engine) = engine(mock, policy);

        let report = engine.deliver_all(records(10)).await.unwrap();

        assert!(report.batch_fallback_engaged);
        assert_eq!(mock.calls().len(), 5);
        assert_eq!(mock.batches().len(), 3);
        assert_eq!(report.batches_submitted, 3);
        assert_eq!(report.total_attempts, 8);
        assert!(report.is_complete());

        let sizes: Vec<usize> = mock.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(mock.batches()[0][0], "user0@example.com");

        for outcome in &report.outcomes {
            let expected = if outcome.index < 5 { 2 } else { 1 };
            assert_eq!(
                outcome.outcome,
                DeliveryOutcome::Delivered {
                    attempts: expected,
                    via_batch: true
                }
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_wakes_records_in_backoff() {
        let mock = MockEndpoint::failing(DeliveryError::retryable(Some(503), "down"));
        let policy = policy()
            .max_concurrency(1)
            .base_backoff(Duration::from_secs(3600))
            .batch_fallback_threshold(3)
            .build()
            .unwrap();
        let (mock, engine) = engine(mock, policy);

        let report = engine.deliver_all(records(3)).await.unwrap();

        // the first two records were sleeping out an hour-long backoff
        assert!(report.duration < Duration::from_secs(1), "{:?}", report.duration);
        assert!(report.batch_fallback_engaged);
        assert_eq!(mock.calls().len(), 3);
        assert_eq!(mock.batches().len(), 1);
        assert_eq!(mock.batches()[0].len(), 3);
        for outcome in &report.outcomes {
            assert_eq!(
                outcome.outcome,
                DeliveryOutcome::Delivered {
                    attempts: 2,
                    via_batch: true
                }
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_batch_is_not_fatal() {
        let mock = MockEndpoint::failing(DeliveryError::retryable(Some(503), "down"))
            .on_batch(|_| Err(DeliveryError::non_retryable(Some(413), "too large")));
        let policy = policy()
            .max_concurrency(1)
            .batch_fallback_threshold(2)
            .build()
            .unwrap();
        let (_, engine) = engine(mock, policy);

        let report = engine.deliver_all(records(4)).await.unwrap();

        assert_eq!(report.failed, 4);
        assert_eq!(report.failures_with(FailureReason::BatchRejected).count(), 4);
        assert!(report.failures[0].detail.contains("413"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_endpoint_fails_run() {
        let mock = MockEndpoint::failing(DeliveryError::unreachable("connection refused"))
            .on_batch(|_| Err(DeliveryError::unreachable("connection refused")));
        let policy = policy()
            .max_concurrency(2)
            .batch_fallback_threshold(3)
            .build()
            .unwrap();
        let (_, engine) = engine(mock, policy);

        let err = engine.deliver_all(records(6)).await.unwrap_err();

        assert!(matches!(err, SyncError::EndpointUnreachable { failed: 6, .. }));
        let report = err.report().unwrap();
        assert!(report.batch_fallback_engaged);
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_ceiling() {
        let mock = MockEndpoint::accepting().with_latency(Duration::from_millis(10));
        let (mock, engine) = engine(mock, policy().max_concurrency(3).build().unwrap());

        let report = engine.deliver_all(records(100)).await.unwrap();

        assert_eq!(report.delivered, 100);
        assert_eq!(mock.peak_in_flight(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spacing() {
        let policy = policy()
            .max_concurrency(4)
            .rate_limit(RateLimit::new(2, Duration::from_millis(1000)))
            .build()
            .unwrap();
        let (mock, engine) = engine(MockEndpoint::accepting(), policy);

        engine.deliver_all(records(6)).await.unwrap();

        let mut starts: Vec<Instant> = mock.calls().iter().map(|c| c.started_at).collect();
        starts.sort();
        assert_eq!(starts.len(), 6);
        for i in 2..starts.len() {
            assert!(starts[i].duration_since(starts[i - 2]) >= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_new_requests() {
        let mock = MockEndpoint::accepting().with_latency(Duration::from_millis(100));
        let (mock, engine) = engine(mock, policy().max_concurrency(1).build().unwrap());

        let start = Instant::now();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            trigger.cancel();
        });

        let report = engine.deliver(records(10), cancel).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls
            .iter()
            .all(|c| c.started_at.duration_since(start) < Duration::from_millis(250)));
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failures_with(FailureReason::Cancelled).count(), 7);
        assert_eq!(report.total(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let mock = MockEndpoint::failing(DeliveryError::retryable(Some(503), "busy"));
        let (mock, engine) = engine(mock, policy().max_retries(5).build().unwrap());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            trigger.cancel();
        });

        let report = engine.deliver(records(1), cancel).await.unwrap();

        // attempts at 0ms and 100ms, cancelled while waiting 200ms
        assert_eq!(mock.calls().len(), 2);
        assert_eq!(report.failures[0].reason, FailureReason::Cancelled);
        assert_eq!(report.failures[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (mock, engine) = engine(MockEndpoint::accepting(), DeliveryPolicy::default());

        let report = engine.deliver_all(Vec::new()).await.unwrap();

        assert_eq!(report.total(), 0);
        assert!(report.is_complete());
        assert_eq!(report.total_attempts, 0);
        assert!(mock.calls().is_empty());
    }
}
