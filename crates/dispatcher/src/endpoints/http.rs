//! HttpEndpoint - JSON over HTTP POST

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use contracts::{CanonicalRecord, DeliveryEndpoint, DeliveryError, EndpointConfig};
use reqwest::{header, Client, Url};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::DispatcherError;
use crate::metrics::EndpointMetrics;

pub const USER_AGENT: &str = concat!("record-syncer/", env!("CARGO_PKG_VERSION"));

/// Header carrying the number of records in the request body
pub const TOTAL_RECORDS_HEADER: &str = "X-Total-Records";

/// Header carrying the 1-based attempt number of a single-record submission
pub const ATTEMPT_HEADER: &str = "X-Attempt-Number";

/// Statuses the collector answers with when it took the payload
const ACCEPTED_STATUSES: [u16; 3] = [200, 201, 202];

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct BatchPayload<'a> {
    timestamp: String,
    total_records: usize,
    customers: &'a [CanonicalRecord],
}

#[derive(Serialize)]
struct ProbePayload {
    test: bool,
    timestamp: String,
    message: &'static str,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Endpoint that POSTs records as JSON
///
/// Single records go to `url`; fallback batches go to `batch_url`, wrapped
/// in an envelope with a timestamp and the record count.
#[derive(Debug)]
pub struct HttpEndpoint {
    name: String,
    url: Url,
    batch_url: Url,
    client: Client,
    metrics: Arc<EndpointMetrics>,
}

impl HttpEndpoint {
    /// Build from configuration.
    ///
    /// # Errors
    /// `InvalidConfig` if the URL is missing or not http(s), `Client` if the
    /// HTTP client cannot be constructed.
    pub fn new(config: &EndpointConfig) -> Result<Self, DispatcherError> {
        let name = config.name.clone();
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| DispatcherError::invalid_config(&name, "url is required"))?;
        let url = parse_url(&name, url)?;
        let batch_url = match config.effective_batch_url() {
            Some(batch_url) => parse_url(&name, batch_url)?,
            None => url.clone(),
        };

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| DispatcherError::Client {
                name: name.clone(),
                source,
            })?;

        debug!(endpoint = %name, %url, %batch_url, "HttpEndpoint created");

        Ok(Self {
            name,
            url,
            batch_url,
            client,
            metrics: Arc::new(EndpointMetrics::new()),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn batch_url(&self) -> &Url {
        &self.batch_url
    }

    pub fn metrics(&self) -> &Arc<EndpointMetrics> {
        &self.metrics
    }

    /// Connection test: POST a marker payload to `url`.
    #[instrument(name = "http_endpoint_probe", skip(self), fields(endpoint = %self.name))]
    pub async fn probe(&self) -> Result<(), DeliveryError> {
        let payload = ProbePayload {
            test: true,
            timestamp: now_rfc3339(),
            message: "connection test",
        };
        self.post(&self.url, &payload, 0, None).await?;
        info!(url = %self.url, "endpoint reachable");
        Ok(())
    }

    async fn post<T>(
        &self,
        url: &Url,
        body: &T,
        total_records: usize,
        attempt: Option<u32>,
    ) -> Result<(), DeliveryError>
    where
        T: Serialize + ?Sized,
    {
        let mut request = self
            .client
            .post(url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(TOTAL_RECORDS_HEADER, total_records.to_string());
        if let Some(attempt) = attempt {
            request = request.header(ATTEMPT_HEADER, attempt.to_string());
        }
        let response = request
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if ACCEPTED_STATUSES.contains(&status.as_u16()) {
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        if body.is_empty() {
            body = status.canonical_reason().unwrap_or("no response body").to_string();
        }
        Err(DeliveryError::from_status(status.as_u16(), body))
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url, DispatcherError> {
    let url = Url::parse(raw)
        .map_err(|e| DispatcherError::invalid_config(name, format!("invalid url '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(DispatcherError::invalid_config(
            name,
            format!("unsupported scheme '{scheme}' in '{raw}'"),
        )),
    }
}

/// Map a failed send to a delivery error.
///
/// Anything that prevented a response (connect, timeout, broken connection)
/// counts as unreachable.
fn classify_transport_error(error: reqwest::Error) -> DeliveryError {
    if error.is_builder() {
        return DeliveryError::non_retryable(None, error.to_string());
    }
    if error.is_timeout() {
        return DeliveryError::unreachable(format!("request timed out: {error}"));
    }
    DeliveryError::unreachable(error.to_string())
}

impl DeliveryEndpoint for HttpEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "http_endpoint_submit",
        skip(self, record),
        fields(endpoint = %self.name, record = record.id())
    )]
    async fn submit(&self, record: &CanonicalRecord, attempt: u32) -> Result<(), DeliveryError> {
        let result = self.post(&self.url, record, 1, Some(attempt)).await;
        self.metrics.record_submission(result.is_ok());
        if let Err(error) = &result {
            debug!(%error, "submission failed");
        }
        result
    }

    #[instrument(
        name = "http_endpoint_submit_batch",
        skip(self, records),
        fields(endpoint = %self.name, size = records.len())
    )]
    async fn submit_batch(&self, records: &[CanonicalRecord]) -> Result<(), DeliveryError> {
        let payload = BatchPayload {
            timestamp: now_rfc3339(),
            total_records: records.len(),
            customers: records,
        };
        let result = self.post(&self.batch_url, &payload, records.len(), None).await;
        self.metrics.record_batch(records.len(), result.is_ok());
        if let Err(error) = &result {
            warn!(%error, "batch submission failed");
        }
        result
    }
}
