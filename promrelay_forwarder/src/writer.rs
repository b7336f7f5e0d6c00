use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use promrelay_resources::{TenantKey, WriteQuery};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::classify::TenantClassifier;
use crate::error::{CanceledSnafu, ForwarderError, Result};
use crate::metrics::ForwarderMetrics;
use crate::options::EndpointOptions;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const BATCH_LOG_SAMPLING_RATE: f32 = 0.001;
const WRONG_TENANT_LOG_SAMPLING_RATE: f32 = 0.01;

/// Encodes one batch and POSTs it to the primary endpoint with retry.
///
/// Shared by all workers; the underlying HTTP client pools connections and
/// is safe for concurrent use.
pub struct BatchWriter {
    client: reqwest::Client,
    classifier: Arc<TenantClassifier>,
    endpoints: Vec<EndpointOptions>,
    retries: usize,
    metrics: Arc<ForwarderMetrics>,
    shutdown: CancellationToken,
}

impl BatchWriter {
    pub fn new(
        client: reqwest::Client,
        classifier: Arc<TenantClassifier>,
        endpoints: Vec<EndpointOptions>,
        retries: usize,
        metrics: Arc<ForwarderMetrics>,
        shutdown: CancellationToken,
    ) -> Self {
        debug_assert!(!endpoints.is_empty());
        Self {
            client,
            classifier,
            endpoints,
            retries,
            metrics,
            shutdown,
        }
    }

    pub(crate) fn metrics(&self) -> &ForwarderMetrics {
        &self.metrics
    }

    /// Delivers one batch under the given tenant.
    ///
    /// Queries whose tags no longer classify to `tenant` are dropped and
    /// counted before encoding; an empty remainder is a no-op success.
    pub async fn write_batch(&self, tenant: &TenantKey, queries: Vec<WriteQuery>) -> Result<()> {
        if rand::random::<f32>() < BATCH_LOG_SAMPLING_RATE {
            debug!(tenant = %tenant, size = queries.len(), "async write batch");
        }

        let queries = self.retain_matching_tenant(tenant, queries);
        if queries.is_empty() {
            return Ok(());
        }

        let payload = match promrelay_remote_write::encode(&queries) {
            Ok(payload) => payload,
            Err(source) => {
                self.metrics.batch_write_err.add(1, &[]);
                return Err(ForwarderError::Encode { source });
            }
        };

        // Only the first endpoint receives data; this forwarder does not
        // distinguish raw from aggregated streams.
        let Some(endpoint) = self.endpoints.first() else {
            return Ok(());
        };

        let result = self.write(endpoint, tenant, payload).await;
        if result.is_err() {
            self.metrics.batch_write_err.add(1, &[]);
        }
        result
    }

    /// Re-classifies every query, keeping only those that still belong to
    /// the batch's tenant.
    fn retain_matching_tenant(
        &self,
        tenant: &TenantKey,
        queries: Vec<WriteQuery>,
    ) -> Vec<WriteQuery> {
        let mut correct = Vec::with_capacity(queries.len());
        let mut wrong_tenants = 0u64;
        for query in queries {
            let expected = self.classifier.classify(&query);
            if &expected == tenant {
                correct.push(query);
            } else {
                wrong_tenants += 1;
                if rand::random::<f32>() < WRONG_TENANT_LOG_SAMPLING_RATE {
                    error!(
                        expected_tenant = %expected,
                        actual_tenant = %tenant,
                        query = %query,
                        from_ingestor = query.options().from_ingestor,
                        "dropping a write because of a wrong tenant"
                    );
                }
            }
        }
        self.metrics.wrong_tenant.add(wrong_tenants, &[]);
        correct
    }

    /// POSTs the payload with exponential backoff, up to `retries + 1`
    /// attempts. 2xx and 409 terminate as success (the endpoint deduplicates
    /// on its side); 4xx other than 429 terminates as invalid params; 429,
    /// 5xx, and transport errors retry. Shutdown interrupts the backoff
    /// sleep, never a request already in flight.
    async fn write(
        &self,
        endpoint: &EndpointOptions,
        tenant: &TenantKey,
        payload: Bytes,
    ) -> Result<()> {
        let started = Instant::now();
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;

        let (status, result) = loop {
            let (status, result) = self.do_request(endpoint, tenant, payload.clone()).await;
            attempt += 1;

            let retryable = matches!(&result, Err(error) if error.is_retryable());
            if !retryable || attempt > self.retries {
                break (status, result);
            }

            tokio::select! {
                _ = tokio::time::sleep(backoff) => backoff *= 2,
                _ = self.shutdown.cancelled() => break (status, CanceledSnafu.fail()),
            }
        };

        self.metrics
            .record_response(&endpoint.name, status, started.elapsed());
        result
    }

    async fn do_request(
        &self,
        endpoint: &EndpointOptions,
        tenant: &TenantKey,
        payload: Bytes,
    ) -> (u16, Result<()>) {
        let mut request = self
            .client
            .post(&endpoint.address)
            .header(CONTENT_ENCODING, "snappy")
            .header(CONTENT_TYPE, "application/x-protobuf")
            .header(endpoint.tenant_header.as_str(), tenant.as_str())
            .body(payload);
        for (name, value) in &endpoint.other_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(api_token) = &endpoint.api_token {
            request = request.basic_auth(tenant.as_str(), Some(api_token));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => {
                // Reported as a synthetic 503 so endpoint metrics show
                // connection failures alongside real statuses.
                return (
                    StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                    Err(ForwarderError::Transport { source }),
                );
            }
        };

        let status = response.status();
        if status.is_success() || status == StatusCode::CONFLICT {
            return (status.as_u16(), Ok(()));
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "error reading body".to_string());
        let code = status.as_u16();
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            (code, Err(ForwarderError::InvalidParams { status: code, body }))
        } else {
            (code, Err(ForwarderError::Status { status: code, body }))
        }
    }
}
