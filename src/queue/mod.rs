//! The deduplicating work queue.
//!
//! Producers [`add`](DedupQueue::add) keys; consumers loop on
//! [`get`](DedupQueue::get), process the key, then call
//! [`done`](DedupQueue::done) exactly once. A key is never handed to two
//! consumers at the same time. Adding a key that is already queued is a
//! no-op; adding one that is being processed schedules it again once its
//! consumer calls `done`, at the tail of the queue.
//!
//! After [`shut_down`](DedupQueue::shut_down), adds are ignored and
//! consumers keep receiving queued keys until the queue is empty. Only then
//! does `get` return `None`.

mod config;
mod reporter;
mod state;

pub use config::{DEFAULT_UNFINISHED_WORK_UPDATE_PERIOD, QueueConfig};

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::metrics::{NoopMetrics, QueueMetrics};
use state::State;

/// A deduplicating FIFO work queue.
///
/// This is a handle: clones share the same queue, so hand one to every
/// producer and consumer. The state is freed when the last handle drops.
pub struct DedupQueue<K> {
    shared: Arc<Shared<K>>,
}

pub(crate) struct Shared<K> {
    name: String,
    state: Mutex<State<K>>,
    /// Consumers blocked in `get`.
    ready: Condvar,
    /// Callers blocked in `shut_down_with_drain`.
    drained: Condvar,
}

impl<K> Clone for DedupQueue<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K> DedupQueue<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    /// Create an unnamed queue without instrumentation.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a queue from explicit options. Starts the unfinished-work
    /// reporter thread when metrics are configured.
    pub fn with_config(config: QueueConfig<K>) -> Self {
        let QueueConfig {
            name,
            metrics,
            clock,
            unfinished_work_update_period,
        } = config;

        let instrumented = metrics.is_some();
        let metrics: Box<dyn QueueMetrics<K>> = match metrics {
            Some(metrics) => metrics,
            None => Box::new(NoopMetrics),
        };

        let shared = Arc::new(Shared {
            name,
            state: Mutex::new(State::new(metrics)),
            ready: Condvar::new(),
            drained: Condvar::new(),
        });

        if instrumented {
            reporter::spawn(&shared, clock.as_ref(), unfinished_work_update_period);
        }

        Self { shared }
    }

    /// Queue name given at construction (empty if unnamed).
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Mark `key` as needing processing.
    ///
    /// Ignored during shutdown or if `key` is already waiting. If `key` is
    /// being processed right now it is scheduled again once that consumer
    /// calls [`done`](Self::done).
    pub fn add(&self, key: K) {
        let mut state = self.shared.state.lock();
        if state.add(key) {
            trace!(queue = %self.shared.name, depth = state.len(), "key queued");
            self.shared.ready.notify_one();
        }
    }

    /// Number of keys waiting to be handed out, not counting keys in flight.
    ///
    /// Informational only. The value can change as soon as it is read, so
    /// don't gate a call to `add` or `get` on it.
    pub fn len(&self) -> usize {
        self.shared.state.lock().len()
    }

    /// Whether no keys are waiting. Same caveats as [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until a key is available and check it out.
    ///
    /// Returns `None` once the queue is shutting down and every queued key
    /// has been handed out; the consumer should then exit its loop. Every
    /// `Some(key)` must be paired with one call to [`done`](Self::done).
    pub fn get(&self) -> Option<K> {
        let mut state = self.shared.state.lock();
        while state.len() == 0 && !state.is_shutting_down() {
            self.shared.ready.wait(&mut state);
        }

        let key = state.pop();
        if key.is_none() {
            trace!(queue = %self.shared.name, "queue drained, releasing consumer");
        }
        key
    }

    /// Finish processing `key`. If it was added again meanwhile, it goes
    /// back on the queue at the tail.
    pub fn done(&self, key: &K) {
        let mut state = self.shared.state.lock();
        if state.done(key) {
            trace!(queue = %self.shared.name, depth = state.len(), "key requeued after processing");
            self.shared.ready.notify_one();
        }
        if state.is_shutting_down() && state.is_idle() {
            self.shared.drained.notify_all();
        }
    }

    /// Stop accepting new keys and release every blocked consumer.
    ///
    /// Queued keys are still handed out; consumers see `None` from `get`
    /// only once the queue is empty. Calling this again has no effect.
    pub fn shut_down(&self) {
        let mut state = self.shared.state.lock();
        self.begin_shutdown(&mut state);
    }

    /// [`shut_down`](Self::shut_down), then block until every queued key
    /// has been handed out and every in-flight key is done.
    ///
    /// Consumers must still be running for this to return. Calling it from a
    /// consumer that holds a key deadlocks.
    pub fn shut_down_with_drain(&self) {
        let mut state = self.shared.state.lock();
        self.begin_shutdown(&mut state);
        while !state.is_idle() {
            self.shared.drained.wait(&mut state);
        }
        debug!(queue = %self.shared.name, "queue drained");
    }

    /// Whether [`shut_down`](Self::shut_down) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shared.state.lock().is_shutting_down()
    }

    fn begin_shutdown(&self, state: &mut State<K>) {
        if state.shut_down() {
            debug!(
                queue = %self.shared.name,
                queued = state.len(),
                in_flight = state.in_flight(),
                "queue shutting down"
            );
        }
        self.shared.ready.notify_all();
    }
}

impl<K> Default for DedupQueue<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for DedupQueue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupQueue")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}
