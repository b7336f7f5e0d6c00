use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use promrelay_resources::{TenantKey, WriteQuery};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::classify::TenantClassifier;
use crate::metrics::ForwarderMetrics;
use crate::pool::WorkerPool;
use crate::queue::WriteQueue;
use crate::writer::BatchWriter;

/// The single consumer of the ingest channel.
///
/// Routes each incoming query to its tenant queue, submits full batches to
/// the worker pool, and flushes partially filled queues on every tick. When
/// the channel closes it drains every queue regardless of size and waits
/// for all in-flight batch jobs before returning.
pub(crate) struct DispatchLoop {
    pub(crate) rx: mpsc::Receiver<WriteQuery>,
    pub(crate) queues: Arc<HashMap<TenantKey, Arc<WriteQueue>>>,
    pub(crate) classifier: Arc<TenantClassifier>,
    pub(crate) writer: Arc<BatchWriter>,
    pub(crate) pool: WorkerPool,
    pub(crate) metrics: Arc<ForwarderMetrics>,
    pub(crate) tick_interval: Duration,
    pub(crate) flush_threshold: usize,
    pub(crate) queue_size: usize,
}

impl DispatchLoop {
    pub(crate) async fn run(mut self) {
        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.tick_interval,
            self.tick_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_query = self.rx.recv() => {
                    let Some(query) = maybe_query else {
                        // All senders dropped: the poison pill.
                        info!("ingest channel closed, exiting the dispatch loop");
                        break;
                    };
                    self.route(query).await;
                }
                _ = ticker.tick() => {
                    self.flush_pending_queues(self.flush_threshold).await;
                }
            }
        }

        info!("draining pending per-tenant write queues");
        let scheduled = self.flush_pending_queues(0).await;
        info!(scheduled, "waiting for all pending batch writes to finish");
        self.pool.close_and_wait().await;
        info!(scheduled, "all pending batch writes are done");
    }

    async fn route(&self, query: WriteQuery) {
        let tenant = self.classifier.classify(&query);
        let Some(queue) = self.queues.get(&tenant) else {
            self.metrics.no_tenant_found.add(1, &[]);
            self.metrics.dropped_writes.add(1, &[]);
            error!(tenant = %tenant, query = %query, "no pre-defined tenant queue, dropping write");
            return;
        };

        if let Some(batch) = queue.add(query) {
            self.metrics.batch_write.add(batch.len() as u64, &[]);
            let writer = self.writer.clone();
            let tenant = tenant.clone();
            self.pool
                .submit(async move {
                    if let Err(error) = writer.write_batch(&tenant, batch).await {
                        error!(tenant = %tenant, %error, "error writing batch");
                    }
                })
                .await;
        }
    }

    /// Schedules a flush for every queue holding at least `threshold`
    /// queries, returning the total number of queries scheduled.
    async fn flush_pending_queues(&self, threshold: usize) -> usize {
        let mut scheduled = 0;
        for (tenant, queue) in self.queues.iter() {
            let len = queue.len();
            if len == 0 {
                continue;
            }
            if len < threshold {
                warn!(
                    tenant = %tenant,
                    size = len,
                    queue_size = self.queue_size,
                    "skipping tick flush for small batch"
                );
                continue;
            }
            scheduled += len;
            let queue = queue.clone();
            let writer = self.writer.clone();
            self.pool
                .submit(async move {
                    queue.flush(&writer).await;
                })
                .await;
        }
        scheduled
    }
}
