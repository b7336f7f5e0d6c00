use parking_lot::RwLock;
use promrelay_resources::{TenantKey, WriteQuery};
use tracing::error;

use crate::writer::BatchWriter;

/// A thread-safe bounded buffer of write queries for one tenant.
///
/// `add` hands back the whole buffer once capacity is reached, so the
/// caller can submit it for delivery; `pop` extracts whatever has
/// accumulated. Ownership of queries transfers to the caller with the
/// returned batch.
pub struct WriteQueue {
    tenant: TenantKey,
    capacity: usize,
    queries: RwLock<Vec<WriteQuery>>,
}

impl WriteQueue {
    pub fn new(tenant: TenantKey, capacity: usize) -> Self {
        Self {
            tenant,
            capacity,
            queries: RwLock::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn tenant(&self) -> &TenantKey {
        &self.tenant
    }

    /// Appends a query, returning the full batch when the queue was at
    /// capacity. The incoming query seeds the fresh buffer in that case.
    pub fn add(&self, query: WriteQuery) -> Option<Vec<WriteQuery>> {
        let mut queries = self.queries.write();
        // The capacity check must happen under the write lock: two adders
        // could otherwise both observe a full queue and pop it twice.
        if queries.len() >= self.capacity {
            let full = Self::pop_locked(&mut queries, self.capacity);
            queries.push(query);
            return Some(full);
        }
        queries.push(query);
        None
    }

    /// Extracts the buffered queries, leaving a fresh buffer behind.
    pub fn pop(&self) -> Vec<WriteQuery> {
        Self::pop_locked(&mut self.queries.write(), self.capacity)
    }

    fn pop_locked(queries: &mut Vec<WriteQuery>, capacity: usize) -> Vec<WriteQuery> {
        // A fresh allocation every time, so the popped batch keeps the only
        // reference to its queries.
        std::mem::replace(queries, Vec::with_capacity(capacity))
    }

    pub fn len(&self) -> usize {
        self.queries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pops and delivers the buffered batch, logging delivery errors
    /// instead of propagating them.
    pub async fn flush(&self, writer: &BatchWriter) {
        let batch = self.pop();
        if batch.is_empty() {
            return;
        }
        writer.metrics().tick_write.add(batch.len() as u64, &[]);
        if let Err(error) = writer.write_batch(&self.tenant, batch).await {
            error!(tenant = %self.tenant, %error, "error writing batch");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use promrelay_resources::{Datapoint, Tags, WriteQueryOptions};

    use super::*;

    fn query(id: usize) -> WriteQuery {
        WriteQuery::new(WriteQueryOptions {
            tags: Tags::from_pairs([("id".to_string(), id.to_string())]),
            datapoints: vec![Datapoint {
                timestamp_nanos: id as i64 + 1,
                value: id as f64,
            }],
            ..Default::default()
        })
        .expect("valid query")
    }

    fn query_id(query: &WriteQuery) -> usize {
        let value = query.tags().get(b"id").expect("id tag");
        String::from_utf8_lossy(value).parse().expect("numeric id")
    }

    #[test]
    fn test_add_returns_batch_at_capacity() {
        let queue = WriteQueue::new(TenantKey::new_unchecked("t"), 2);

        assert!(queue.add(query(0)).is_none());
        assert!(queue.add(query(1)).is_none());

        let batch = queue.add(query(2)).expect("queue was full");
        assert_eq!(batch.len(), 2);
        // The overflowing query seeds the fresh buffer instead of being lost.
        assert_eq!(queue.len(), 1);
        assert_eq!(query_id(&queue.pop()[0]), 2);
    }

    #[test]
    fn test_pop_resets_buffer() {
        let queue = WriteQueue::new(TenantKey::new_unchecked("t"), 4);
        queue.add(query(0));
        queue.add(query(1));

        let batch = queue.pop();

        assert_eq!(batch.len(), 2);
        assert_eq!(queue.len(), 0);
        assert!(queue.pop().is_empty());
    }

    #[test]
    fn test_concurrent_adds_lose_nothing() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 500;
        const CAPACITY: usize = 10;

        let queue = Arc::new(WriteQueue::new(TenantKey::new_unchecked("t"), CAPACITY));

        let handles: Vec<_> = (0..THREADS)
            .map(|thread| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    let mut popped = Vec::new();
                    for i in 0..PER_THREAD {
                        if let Some(batch) = queue.add(query(thread * PER_THREAD + i)) {
                            assert!(batch.len() <= CAPACITY);
                            popped.extend(batch);
                        }
                        assert!(queue.len() <= CAPACITY);
                    }
                    popped
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for query in handle.join().expect("thread panicked") {
                assert!(seen.insert(query_id(&query)), "query delivered twice");
            }
        }
        for query in queue.pop() {
            assert!(seen.insert(query_id(&query)), "query delivered twice");
        }

        // Every add is either in a popped batch or still buffered; nothing
        // is lost or duplicated.
        assert_eq!(seen.len(), THREADS * PER_THREAD);
    }
}
