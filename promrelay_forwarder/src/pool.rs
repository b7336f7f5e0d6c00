use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use snafu::Snafu;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

/// A fixed-size pool of workers running batch-flush jobs.
///
/// `submit` waits until one of the `pool_size` slots frees up, so a saturated
/// pool back-pressures the dispatch loop. Jobs are fire-and-forget once
/// submitted; `close_and_wait` is the barrier shutdown uses to wait for every
/// job that was ever submitted.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
}

#[derive(Debug, Snafu)]
#[snafu(display("no worker became available within {timeout:?}"))]
pub struct SubmitTimeout {
    timeout: Duration,
}

impl WorkerPool {
    pub fn new(pool_size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(pool_size)),
            tracker: TaskTracker::new(),
        }
    }

    /// Runs the job on the next free worker, waiting for one if needed.
    pub async fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // The semaphore is never closed, so acquisition only fails if the
        // pool is torn down mid-submit; the job is dropped in that case.
        let Ok(permit) = self.permits.clone().acquire_owned().await else {
            return;
        };
        self.tracker.spawn(async move {
            job.await;
            drop(permit);
        });
    }

    /// Like [`submit`](Self::submit), but gives up when no worker frees up
    /// within `timeout`. Used by latency-sensitive side paths, not by the
    /// write pipeline.
    pub async fn submit_with_timeout<F>(&self, timeout: Duration, job: F) -> Result<(), SubmitTimeout>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = match tokio::time::timeout(timeout, self.permits.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            _ => return SubmitTimeoutSnafu { timeout }.fail(),
        };
        self.tracker.spawn(async move {
            job.await;
            drop(permit);
        });
        Ok(())
    }

    /// Waits for every submitted job to finish.
    pub async fn close_and_wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
