//! Construction options for [`DedupQueue`](super::DedupQueue).

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, RealClock};
use crate::metrics::{OtelQueueMetrics, QueueMetrics};

/// How often the background reporter refreshes unfinished-work metrics.
pub const DEFAULT_UNFINISHED_WORK_UPDATE_PERIOD: Duration = Duration::from_millis(500);

/// Options for building a queue. `QueueConfig::default()` gives an unnamed
/// queue with no instrumentation.
pub struct QueueConfig<K> {
    /// Name used in log fields and the `queue` metric attribute.
    pub name: String,
    /// Instrumentation hook. `None` records nothing and starts no
    /// background reporter.
    pub metrics: Option<Box<dyn QueueMetrics<K>>>,
    /// Time source driving the reporter ticks.
    pub clock: Arc<dyn Clock>,
    pub unfinished_work_update_period: Duration,
}

impl<K> Default for QueueConfig<K> {
    fn default() -> Self {
        Self {
            name: String::new(),
            metrics: None,
            clock: Arc::new(RealClock),
            unfinished_work_update_period: DEFAULT_UNFINISHED_WORK_UPDATE_PERIOD,
        }
    }
}

impl<K> QueueConfig<K> {
    /// Default options with a queue name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn metrics(mut self, metrics: impl QueueMetrics<K> + 'static) -> Self {
        self.metrics = Some(Box::new(metrics));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn unfinished_work_update_period(mut self, period: Duration) -> Self {
        self.unfinished_work_update_period = period;
        self
    }
}

impl<K> QueueConfig<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    /// Record metrics through OpenTelemetry on the global meter provider.
    ///
    /// Uses the name and clock configured so far, so set those first.
    pub fn otel_metrics(self) -> Self {
        let metrics = OtelQueueMetrics::new(self.name.clone(), Arc::clone(&self.clock));
        self.metrics(metrics)
    }
}
