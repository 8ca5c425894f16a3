//! Fixed-size worker pool that drains the durable queue (spec §4.4).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, warn};

use relay_core::db::QueueRepository;

use crate::executor::Executor;

/// Polls the durable queue with `concurrency` concurrent workers, handing
/// each reserved job to the executor.
pub struct WorkerPool {
    queue: QueueRepository,
    executor: Arc<Executor>,
    concurrency: usize,
    visibility_timeout_secs: i64,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

/// How long an idle worker waits before polling the queue again when it's empty.
const EMPTY_QUEUE_BACKOFF: Duration = Duration::from_millis(250);

impl WorkerPool {
    pub fn new(queue: QueueRepository, executor: Arc<Executor>, concurrency: usize, visibility_timeout_secs: i64) -> Self {
        Self {
            queue,
            executor,
            concurrency: concurrency.max(1),
            visibility_timeout_secs,
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }

    /// Spawn `concurrency` worker tasks. Each loops reserving and executing
    /// jobs until `shutdown` is set; a worker never abandons a job it has
    /// already reserved, even after shutdown is requested.
    pub fn start(&mut self) {
        for worker_id in 0..self.concurrency {
            let queue = self.queue.clone();
            let executor = self.executor.clone();
            let visibility_timeout_secs = self.visibility_timeout_secs;
            let shutdown = self.shutdown.clone();

            let handle = tokio::spawn(async move {
                loop {
                    let job = match queue.reserve(visibility_timeout_secs).await {
                        Ok(job) => job,
                        Err(err) => {
                            error!(worker_id, error = %err, "queue reservation failed");
                            sleep(EMPTY_QUEUE_BACKOFF).await;
                            continue;
                        }
                    };

                    let Some(job) = job else {
                        if shutdown.load(Ordering::Relaxed) {
                            return;
                        }
                        sleep(EMPTY_QUEUE_BACKOFF).await;
                        continue;
                    };

                    if let Err(err) = executor.process(job.intent_id, job.attempts).await {
                        warn!(worker_id, intent_id = %job.intent_id, error = %err, "execution failed unexpectedly");
                    }

                    if shutdown.load(Ordering::Relaxed) {
                        return;
                    }
                }
            });

            self.handles.push(handle);
        }
    }

    /// Signal workers to stop once their current job (if any) finishes, and
    /// wait for them to exit. No in-flight job is ever abandoned mid-execution.
    pub async fn shutdown(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
