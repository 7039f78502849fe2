//! Mock endpoint
//!
//! Scriptable in-process endpoint for tests and local experiments. Records
//! every call with its start instant and tracks the peak number of
//! concurrent submissions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use contracts::{CanonicalRecord, DeliveryEndpoint, DeliveryError};
use tokio::time::Instant;

type IndividualScript = Box<dyn FnMut(&CanonicalRecord, u32) -> Result<(), DeliveryError> + Send>;
type BatchScript = Box<dyn FnMut(&[CanonicalRecord]) -> Result<(), DeliveryError> + Send>;

/// One individual submission seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub record_id: String,
    /// Attempt number passed by the caller
    pub attempt: u32,
    pub started_at: Instant,
    pub succeeded: bool,
}

/// In-process `DeliveryEndpoint` driven by closures.
pub struct MockEndpoint {
    name: String,
    latency: Duration,
    individual: Mutex<IndividualScript>,
    batch: Mutex<BatchScript>,
    calls: Mutex<Vec<MockCall>>,
    batches: Mutex<Vec<Vec<String>>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl std::fmt::Debug for MockEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockEndpoint")
            .field("name", &self.name)
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

impl Default for MockEndpoint {
    fn default() -> Self {
        Self::accepting()
    }
}

impl MockEndpoint {
    /// Accepts every record and every batch.
    pub fn accepting() -> Self {
        Self {
            name: "mock".to_string(),
            latency: Duration::ZERO,
            individual: Mutex::new(Box::new(|_, _| Ok(()))),
            batch: Mutex::new(Box::new(|_| Ok(()))),
            calls: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Fails every individual submission with `error`; batches still succeed.
    pub fn failing(error: DeliveryError) -> Self {
        Self::accepting().on_submit(move |_, _| Err(error.clone()))
    }

    /// Script individual submissions: `(record, attempt) -> result`.
    pub fn on_submit<F>(self, script: F) -> Self
    where
        F: FnMut(&CanonicalRecord, u32) -> Result<(), DeliveryError> + Send + 'static,
    {
        Self {
            individual: Mutex::new(Box::new(script)),
            ..self
        }
    }

    /// Script batch submissions.
    pub fn on_batch<F>(self, script: F) -> Self
    where
        F: FnMut(&[CanonicalRecord]) -> Result<(), DeliveryError> + Send + 'static,
    {
        Self {
            batch: Mutex::new(Box::new(script)),
            ..self
        }
    }

    /// Simulated time spent per request.
    pub fn with_latency(self, latency: Duration) -> Self {
        Self { latency, ..self }
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }

    /// Every individual submission so far, in start order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Start instants of the submissions for one record.
    pub fn call_times(&self, record_id: &str) -> Vec<Instant> {
        self.calls()
            .into_iter()
            .filter(|call| call.record_id == record_id)
            .map(|call| call.started_at)
            .collect()
    }

    /// Record ids of every batch, in submission order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Highest number of concurrently running submissions observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Acquire)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl DeliveryEndpoint for MockEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, record: &CanonicalRecord, attempt: u32) -> Result<(), DeliveryError> {
        let started_at = Instant::now();
        self.enter();
        self.simulate_latency().await;

        let result = {
            let mut script = self.individual.lock().unwrap_or_else(PoisonError::into_inner);
            (*script)(record, attempt)
        };

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockCall {
                record_id: record.id().to_string(),
                attempt,
                started_at,
                succeeded: result.is_ok(),
            });
        self.leave();
        result
    }

    async fn submit_batch(&self, records: &[CanonicalRecord]) -> Result<(), DeliveryError> {
        self.enter();
        self.simulate_latency().await;

        let result = {
            let mut script = self.batch.lock().unwrap_or_else(PoisonError::into_inner);
            (*script)(records)
        };
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(records.iter().map(|r| r.id().to_string()).collect());
        self.leave();
        result
    }
}
