//! Batch fallback phase.
//!
//! Runs after individual delivery has drained. Every deferred record is sent
//! exactly once more, grouped into all-or-nothing batches.

use std::sync::atomic::Ordering;

use contracts::{CanonicalRecord, DeliveryEndpoint, DeliveryOutcome, FailureReason};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::engine::Run;
use crate::gate;

/// A record taken out of individual delivery.
#[derive(Debug)]
pub(crate) struct DeferredRecord {
    pub index: usize,
    pub record: CanonicalRecord,
    /// Individual attempts already made
    pub attempts: u32,
}

impl DeferredRecord {
    pub fn new(index: usize, record: CanonicalRecord, attempts: u32) -> Self {
        Self {
            index,
            record,
            attempts,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct BatchSummary {
    pub submitted: u64,
    pub unreachable: u64,
}

impl BatchSummary {
    /// Every submitted batch failed at the transport level.
    pub fn all_unreachable(&self) -> bool {
        self.submitted > 0 && self.unreachable == self.submitted
    }
}

/// Submit the deferred records in input order, `batch_size` at a time.
pub(crate) async fn submit_deferred<E>(
    run: &Run<E>,
    mut deferred: Vec<DeferredRecord>,
    outcomes: &mut [DeliveryOutcome],
) -> BatchSummary
where
    E: DeliveryEndpoint + Sync,
{
    deferred.sort_by_key(|d| d.index);
    let batch_size = run.policy.batch_size();
    let endpoint = run.endpoint.name();
    let mut summary = BatchSummary::default();

    info!(
        records = deferred.len(),
        batch_size,
        "submitting deferred records as batches"
    );

    for chunk in deferred.chunks(batch_size) {
        let admitted = match gate::acquire_permit(&run.semaphore, &run.cancel).await {
            Some(permit) if run.limiter.acquire(&run.cancel).await => Some(permit),
            _ => None,
        };
        let Some(permit) = admitted.filter(|_| !run.cancel.is_cancelled()) else {
            for d in chunk {
                outcomes[d.index] = DeliveryOutcome::failed(
                    FailureReason::Cancelled,
                    d.attempts,
                    "run cancelled before batch submission",
                );
            }
            continue;
        };

        let records: Vec<CanonicalRecord> = chunk.iter().map(|d| d.record.clone()).collect();
        run.attempts.fetch_add(1, Ordering::Relaxed);
        summary.submitted += 1;

        let started = Instant::now();
        let result = run.endpoint.submit_batch(&records).await;
        drop(permit);
        observability::record_batch_submission(
            endpoint,
            records.len(),
            result.is_ok(),
            started.elapsed(),
        );

        match result {
            Ok(()) => {
                info!(size = records.len(), "batch accepted");
                for d in chunk {
                    outcomes[d.index] = DeliveryOutcome::Delivered {
                        attempts: d.attempts + 1,
                        via_batch: true,
                    };
                }
            }
            Err(error) => {
                if error.is_unreachable() {
                    summary.unreachable += 1;
                }
                warn!(size = records.len(), %error, "batch rejected");
                let detail = error.to_string();
                for d in chunk {
                    outcomes[d.index] = DeliveryOutcome::failed(
                        FailureReason::BatchRejected,
                        d.attempts + 1,
                        detail.clone(),
                    );
                }
            }
        }
    }

    summary
}
