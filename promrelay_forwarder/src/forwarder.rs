use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use promrelay_resources::WriteQuery;
use snafu::ResultExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::classify::TenantClassifier;
use crate::dispatch::DispatchLoop;
use crate::error::{ClosedSnafu, ForwarderError, HttpClientSnafu, Result};
use crate::metrics::ForwarderMetrics;
use crate::options::ForwarderOptions;
use crate::pool::WorkerPool;
use crate::queue::WriteQueue;
use crate::writer::BatchWriter;

/// Prometheus remote-write compatible forwarder.
///
/// Construction validates the options, builds one write queue per configured
/// tenant plus the default, and starts the dispatch loop in a background
/// task. See the crate docs for the pipeline.
pub struct Forwarder {
    tx: Mutex<Option<mpsc::Sender<WriteQuery>>>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
    metrics: Arc<ForwarderMetrics>,
}

impl Forwarder {
    pub fn new(options: ForwarderOptions) -> Result<Self> {
        options.validate()?;
        info!(
            queue_size = options.queue_size,
            pool_size = options.pool_size,
            "creating prometheus remote write forwarder"
        );

        let metrics = Arc::new(ForwarderMetrics::default());
        let classifier = Arc::new(TenantClassifier::new(
            options.tenant_rules.clone(),
            options.tenant_default.clone(),
        ));

        // One queue per tenant, fixed at startup. Never grows at runtime;
        // queries classified outside this set are dropped and counted.
        let mut queues = HashMap::with_capacity(options.tenant_rules.len() + 1);
        queues.insert(
            options.tenant_default.clone(),
            Arc::new(WriteQueue::new(
                options.tenant_default.clone(),
                options.queue_size,
            )),
        );
        for rule in &options.tenant_rules {
            if !queues.contains_key(&rule.tenant) {
                info!(tenant = %rule.tenant, "adding tenant to the fixed tenant list");
                queues.insert(
                    rule.tenant.clone(),
                    Arc::new(WriteQueue::new(rule.tenant.clone(), options.queue_size)),
                );
            }
        }
        let queues = Arc::new(queues);

        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .context(HttpClientSnafu)?;

        let shutdown = CancellationToken::new();
        let writer = Arc::new(BatchWriter::new(
            client,
            classifier.clone(),
            options.endpoints.clone(),
            options.retries,
            metrics.clone(),
            shutdown.clone(),
        ));

        let (tx, rx) = mpsc::channel(options.queue_size);
        let dispatch = DispatchLoop {
            rx,
            queues: queues.clone(),
            classifier,
            writer,
            pool: WorkerPool::new(options.pool_size),
            metrics: metrics.clone(),
            tick_interval: options.tick_interval,
            flush_threshold: options.flush_threshold(),
            queue_size: options.queue_size,
        };
        let dispatch = tokio::spawn(dispatch.run());

        info!(
            num_tenants = queues.len(),
            "prometheus remote write forwarder started"
        );

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            dispatch: Mutex::new(Some(dispatch)),
            shutdown,
            metrics,
        })
    }

    /// Enqueues one write query for asynchronous delivery.
    ///
    /// Blocks only while the ingest channel is full; delivery outcome is
    /// observable through metrics and logs, not through this result.
    /// Duplicate writes are counted and skipped. Queries flagged
    /// `from_ingestor` are deep-copied before enqueueing, since their
    /// producer may recycle the underlying buffers.
    pub async fn write(&self, query: WriteQuery) -> Result<()> {
        if query.options().duplicate_write {
            self.metrics.duplicate_writes.add(1, &[]);
            return Ok(());
        }

        let query = if query.options().from_ingestor {
            self.metrics.ingestor_writes.add(1, &[]);
            match WriteQuery::new(query.options().deep_copy()) {
                Ok(copy) => copy,
                Err(source) => {
                    self.metrics.enqueue_error.add(1, &[]);
                    error!(error = %source, query = %query, "error copying write");
                    return Err(ForwarderError::QueryCopy { source });
                }
            }
        } else {
            query
        };

        let Some(tx) = self.tx.lock().clone() else {
            self.metrics.enqueue_error.add(1, &[]);
            return ClosedSnafu.fail();
        };
        if tx.send(query).await.is_err() {
            self.metrics.enqueue_error.add(1, &[]);
            return ClosedSnafu.fail();
        }
        self.metrics.enqueued.add(1, &[]);

        Ok(())
    }

    /// Flushes every pending queue and waits for all in-flight batches.
    ///
    /// Dropping the ingest sender is the poison pill the dispatch loop
    /// drains on. Cancellation only interrupts retry backoff, so a healthy
    /// endpoint still receives everything accepted before the close.
    /// Idempotent; concurrent callers after the first return immediately.
    pub async fn close(&self) -> Result<()> {
        drop(self.tx.lock().take());
        self.shutdown.cancel();

        let dispatch = self.dispatch.lock().take();
        if let Some(dispatch) = dispatch {
            if let Err(error) = dispatch.await {
                error!(%error, "dispatch task failed during drain");
            }
        }

        Ok(())
    }

    pub fn storage_type(&self) -> &'static str {
        "remote-dc"
    }

    pub fn name(&self) -> &'static str {
        "prom-remote"
    }

    pub fn error_behavior(&self) -> &'static str {
        "fail"
    }
}
