//! OpenTelemetry-backed queue metrics.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};

use super::QueueMetrics;
use crate::clock::Clock;
use crate::telemetry::metrics as instruments;

/// Records depth, adds, queue latency, work duration and unfinished work
/// for one named queue.
///
/// Every data point carries a `queue` attribute with the queue name.
pub struct OtelQueueMetrics<K> {
    clock: Arc<dyn Clock>,
    attrs: [KeyValue; 1],

    depth: UpDownCounter<i64>,
    adds: Counter<u64>,
    latency: Histogram<f64>,
    work_duration: Histogram<f64>,
    unfinished_work: Gauge<f64>,
    longest_running: Gauge<f64>,

    added_at: HashMap<K, Instant>,
    started_at: HashMap<K, Instant>,
}

impl<K> OtelQueueMetrics<K>
where
    K: Eq + Hash + Clone + Send,
{
    /// Build metrics on the globally registered meter provider.
    pub fn new(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self::with_meter(&instruments::meter(), name, clock)
    }

    /// Build metrics on an explicit meter.
    pub fn with_meter(meter: &Meter, name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            attrs: [KeyValue::new("queue", name.into())],
            depth: instruments::queue_depth(meter),
            adds: instruments::queue_adds(meter),
            latency: instruments::queue_latency(meter),
            work_duration: instruments::work_duration(meter),
            unfinished_work: instruments::unfinished_work(meter),
            longest_running: instruments::longest_running_processor(meter),
            added_at: HashMap::new(),
            started_at: HashMap::new(),
        }
    }

    /// Total seconds spent so far by every key currently in flight.
    pub fn unfinished_work_seconds(&self) -> f64 {
        let now = self.clock.now();
        self.started_at
            .values()
            .map(|t| now.saturating_duration_since(*t).as_secs_f64())
            .sum()
    }

    /// Age in seconds of the oldest key currently in flight, or zero.
    pub fn longest_running_processor_seconds(&self) -> f64 {
        let now = self.clock.now();
        self.started_at
            .values()
            .map(|t| now.saturating_duration_since(*t).as_secs_f64())
            .fold(0.0, f64::max)
    }
}

impl<K> QueueMetrics<K> for OtelQueueMetrics<K>
where
    K: Eq + Hash + Clone + Send,
{
    fn add(&mut self, key: &K) {
        self.adds.add(1, &self.attrs);
        self.depth.add(1, &self.attrs);
        if !self.added_at.contains_key(key) {
            self.added_at.insert(key.clone(), self.clock.now());
        }
    }

    fn get(&mut self, key: &K) {
        let now = self.clock.now();
        self.depth.add(-1, &self.attrs);
        if let Some(added) = self.added_at.remove(key) {
            self.latency.record(
                now.saturating_duration_since(added).as_secs_f64(),
                &self.attrs,
            );
        }
        self.started_at.insert(key.clone(), now);
    }

    fn done(&mut self, key: &K) {
        if let Some(started) = self.started_at.remove(key) {
            self.work_duration.record(
                self.clock.now().saturating_duration_since(started).as_secs_f64(),
                &self.attrs,
            );
        }
    }

    fn update_unfinished_work(&mut self) {
        self.unfinished_work
            .record(self.unfinished_work_seconds(), &self.attrs);
        self.longest_running
            .record(self.longest_running_processor_seconds(), &self.attrs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use opentelemetry::metrics::MeterProvider as _;
    use std::time::Duration;

    fn metrics(clock: &FakeClock) -> OtelQueueMetrics<&'static str> {
        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder().build();
        let meter = provider.meter("dedupq-test");
        OtelQueueMetrics::with_meter(&meter, "test", Arc::new(clock.clone()))
    }

    #[test]
    fn unfinished_work_sums_in_flight_ages() {
        let clock = FakeClock::new();
        let mut m = metrics(&clock);

        m.add(&"a");
        m.add(&"b");
        m.get(&"a");
        clock.step(Duration::from_secs(2));
        m.get(&"b");
        clock.step(Duration::from_secs(1));

        assert_eq!(m.unfinished_work_seconds(), 4.0);
        assert_eq!(m.longest_running_processor_seconds(), 3.0);
        m.update_unfinished_work();
    }

    #[test]
    fn done_clears_processing_start() {
        let clock = FakeClock::new();
        let mut m = metrics(&clock);

        m.add(&"a");
        m.get(&"a");
        clock.step(Duration::from_secs(5));
        m.done(&"a");

        assert_eq!(m.unfinished_work_seconds(), 0.0);
        assert_eq!(m.longest_running_processor_seconds(), 0.0);
    }

    #[test]
    fn re_add_keeps_first_add_time() {
        let clock = FakeClock::new();
        let mut m = metrics(&clock);

        m.add(&"a");
        let first = m.added_at[&"a"];
        clock.step(Duration::from_secs(1));
        m.add(&"a");
        assert_eq!(m.added_at[&"a"], first);
    }
}
