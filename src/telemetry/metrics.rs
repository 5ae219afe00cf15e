//! Metric instrument factories for dedupq.
//!
//! Uses the OTel Meter API. [`meter`] returns the meter from the globally
//! registered `MeterProvider`; the factories accept any meter so tests can
//! use a private provider.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};

/// Returns the shared meter for dedupq instruments.
pub fn meter() -> Meter {
    opentelemetry::global::meter("dedupq")
}

/// UpDownCounter: keys waiting to be handed to a consumer.
/// Labels: `queue`.
pub fn queue_depth(meter: &Meter) -> UpDownCounter<i64> {
    meter
        .i64_up_down_counter("dedupq.queue.depth")
        .with_description("Current depth of the work queue")
        .build()
}

/// Counter: adds that made a key pending.
/// Labels: `queue`.
pub fn queue_adds(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter("dedupq.queue.adds")
        .with_description("Number of adds handled by the work queue")
        .build()
}

/// Histogram: time a key waited between first add and get.
/// Labels: `queue`.
pub fn queue_latency(meter: &Meter) -> Histogram<f64> {
    meter
        .f64_histogram("dedupq.queue.latency")
        .with_description("How long a key stays in the queue before being requested")
        .with_unit("s")
        .build()
}

/// Histogram: time between get and done.
/// Labels: `queue`.
pub fn work_duration(meter: &Meter) -> Histogram<f64> {
    meter
        .f64_histogram("dedupq.queue.work_duration")
        .with_description("How long processing a key from the queue takes")
        .with_unit("s")
        .build()
}

/// Gauge: summed age of all keys still in flight.
/// Labels: `queue`.
pub fn unfinished_work(meter: &Meter) -> Gauge<f64> {
    meter
        .f64_gauge("dedupq.queue.unfinished_work")
        .with_description("Seconds of work in progress not yet observed by work_duration")
        .with_unit("s")
        .build()
}

/// Gauge: age of the longest running in-flight key.
/// Labels: `queue`.
pub fn longest_running_processor(meter: &Meter) -> Gauge<f64> {
    meter
        .f64_gauge("dedupq.queue.longest_running_processor")
        .with_description("Seconds the longest running processor has been running")
        .with_unit("s")
        .build()
}
