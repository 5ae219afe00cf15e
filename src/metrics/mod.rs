//! Instrumentation hook for queue events.
//!
//! The queue calls these methods while holding its own lock, so an
//! implementation sees events in a total order and needs no locking of its
//! own. Implementations must not block. Hooks run after the queue has
//! updated its sets; a hook that panics is logged and otherwise ignored.

mod otel;

pub use otel::OtelQueueMetrics;

/// Receives queue lifecycle events for one queue.
pub trait QueueMetrics<K>: Send {
    /// A key became pending (not called for deduplicated adds).
    fn add(&mut self, key: &K);

    /// A key was handed to a consumer.
    fn get(&mut self, key: &K);

    /// A consumer finished with a key.
    fn done(&mut self, key: &K);

    /// Periodic tick from the background reporter.
    fn update_unfinished_work(&mut self);
}

/// Metrics implementation that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl<K> QueueMetrics<K> for NoopMetrics {
    fn add(&mut self, _key: &K) {}
    fn get(&mut self, _key: &K) {}
    fn done(&mut self, _key: &K) {}
    fn update_unfinished_work(&mut self) {}
}
