use std::time::Duration;

use promrelay_observability::{Counter, Histogram, KeyValue, Meter};

const METRICS_SCOPE: &str = "prom_remote_forwarder";

/// Pipeline counters and the per-endpoint response timer.
pub struct ForwarderMetrics {
    pub(crate) dropped_writes: Counter<u64>,
    pub(crate) duplicate_writes: Counter<u64>,
    pub(crate) ingestor_writes: Counter<u64>,
    pub(crate) enqueued: Counter<u64>,
    pub(crate) enqueue_error: Counter<u64>,
    pub(crate) batch_write: Counter<u64>,
    pub(crate) batch_write_err: Counter<u64>,
    pub(crate) tick_write: Counter<u64>,
    pub(crate) no_tenant_found: Counter<u64>,
    pub(crate) wrong_tenant: Counter<u64>,
    http_write_duration: Histogram<f64>,
}

impl ForwarderMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            dropped_writes: meter
                .u64_counter("dropped_writes")
                .with_unit("{write}")
                .with_description("writes dropped before dispatch")
                .build(),
            duplicate_writes: meter
                .u64_counter("duplicate_writes")
                .with_description("writes skipped because the caller marked them duplicate")
                .build(),
            ingestor_writes: meter
                .u64_counter("ingestor_writes")
                .with_description("writes deep-copied because the producer reuses the query")
                .build(),
            enqueued: meter
                .u64_counter("enqueued")
                .with_unit("{write}")
                .with_description("writes accepted onto the ingest channel")
                .build(),
            enqueue_error: meter
                .u64_counter("enqueue_error")
                .with_description("writes rejected before reaching the ingest channel")
                .build(),
            batch_write: meter
                .u64_counter("batch_write")
                .with_description("queries flushed because a tenant queue filled up")
                .build(),
            batch_write_err: meter
                .u64_counter("batch_write_err")
                .with_description("batches that failed to encode or deliver")
                .build(),
            tick_write: meter
                .u64_counter("tick_write")
                .with_description("queries scheduled for delivery by tick flushes")
                .build(),
            no_tenant_found: meter
                .u64_counter("no_tenant_found")
                .with_description("writes classified to a tenant without a queue")
                .build(),
            wrong_tenant: meter
                .u64_counter("wrong_tenant")
                .with_description("queries dropped by the pre-send tenant re-check")
                .build(),
            http_write_duration: meter
                .f64_histogram("http_write_duration")
                .with_unit("s")
                .with_description("remote write response time by endpoint")
                .build(),
        }
    }

    pub(crate) fn record_response(&self, endpoint_name: &str, status: u16, elapsed: Duration) {
        self.http_write_duration.record(
            elapsed.as_secs_f64(),
            &[
                KeyValue::new("endpoint_name", endpoint_name.to_string()),
                KeyValue::new("status", i64::from(status)),
            ],
        );
    }
}

impl Default for ForwarderMetrics {
    fn default() -> Self {
        Self::new(&promrelay_observability::meter(METRICS_SCOPE))
    }
}
