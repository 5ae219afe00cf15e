//! A fixed pool of consumer threads draining a [`DedupQueue`].
//!
//! Each worker runs the usual loop: `get`, call the handler, `done`. The key
//! is marked done even when the handler fails or panics, so a bad key never
//! stays checked out. Handler errors are logged and otherwise dropped;
//! retrying is up to the handler (for instance by adding the key again).

use std::fmt::Display;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::queue::DedupQueue;
use crate::telemetry::work::{record_outcome, start_item_span};

/// Handles to a running set of consumer threads.
pub struct WorkerPool {
    queue_name: String,
    handles: Vec<JoinHandle<WorkerStats>>,
}

/// What a single worker did before it exited.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl WorkerStats {
    fn merge(self, other: WorkerStats) -> WorkerStats {
        WorkerStats {
            processed: self.processed + other.processed,
            failed: self.failed + other.failed,
            panicked: self.panicked + other.panicked,
        }
    }
}

impl WorkerPool {
    /// Start `workers` consumer threads on `queue`.
    ///
    /// The workers run until the queue is shut down and drained. If a
    /// thread fails to start, the queue is shut down so the workers already
    /// running exit, and the spawn error is returned.
    pub fn spawn<K, F, E>(queue: &DedupQueue<K>, workers: usize, handler: F) -> Result<Self>
    where
        K: Eq + Hash + Clone + Send + 'static,
        F: Fn(&K) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Display,
    {
        if workers == 0 {
            return Err(Error::Config("worker pool needs at least one worker".to_string()));
        }

        let handler = Arc::new(handler);
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker_queue = queue.clone();
            let handler = Arc::clone(&handler);
            let handle = thread::Builder::new()
                .name(format!("dedupq-worker-{id}"))
                .spawn(move || run_worker(id, &worker_queue, &*handler));

            match handle {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    queue.shut_down();
                    return Err(e.into());
                }
            }
        }

        debug!(queue = %queue.name(), workers, "worker pool started");
        Ok(Self {
            queue_name: queue.name().to_string(),
            handles,
        })
    }

    /// Number of worker threads in the pool.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit and sum their stats.
    ///
    /// Blocks until the queue is shut down and drained.
    pub fn join(self) -> Result<WorkerStats> {
        let mut total = WorkerStats::default();
        let mut lost = 0usize;
        for handle in self.handles {
            match handle.join() {
                Ok(stats) => total = total.merge(stats),
                Err(_) => lost += 1,
            }
        }

        if lost > 0 {
            return Err(Error::Other(format!(
                "{lost} worker thread(s) of queue {:?} terminated abnormally",
                self.queue_name
            )));
        }

        debug!(
            queue = %self.queue_name,
            processed = total.processed,
            failed = total.failed,
            panicked = total.panicked,
            "worker pool stopped"
        );
        Ok(total)
    }
}

/// Marks the key done when dropped, including during unwinding.
struct DoneGuard<'a, K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    queue: &'a DedupQueue<K>,
    key: K,
}

impl<K> Drop for DoneGuard<'_, K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    fn drop(&mut self) {
        self.queue.done(&self.key);
    }
}

fn run_worker<K, F, E>(id: usize, queue: &DedupQueue<K>, handler: &F) -> WorkerStats
where
    K: Eq + Hash + Clone + Send + 'static,
    F: Fn(&K) -> std::result::Result<(), E>,
    E: Display,
{
    let mut stats = WorkerStats::default();

    while let Some(key) = queue.get() {
        let guard = DoneGuard { queue, key };
        let span = start_item_span(queue.name(), id);
        let _enter = span.enter();

        match panic::catch_unwind(AssertUnwindSafe(|| handler(&guard.key))) {
            Ok(Ok(())) => {
                stats.processed += 1;
                record_outcome(&span, "ok");
            }
            Ok(Err(e)) => {
                stats.failed += 1;
                record_outcome(&span, "error");
                warn!(error = %e, "handler failed");
            }
            Err(_) => {
                stats.panicked += 1;
                record_outcome(&span, "panic");
                warn!("handler panicked");
            }
        }
    }

    debug!(queue = %queue.name(), worker = id, "worker exiting");
    stats
}
