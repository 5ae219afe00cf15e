//! Integration tests for telemetry initialization and span helpers.

use std::sync::Arc;

use dedupq::clock::RealClock;
use dedupq::{DedupQueue, QueueConfig};

#[test]
fn telemetry_initializes_without_endpoint() {
    // Note: tracing subscriber can only be set once per process.
    // Using try_init() in the implementation avoids panics if another
    // test already initialized a subscriber.
    let config = dedupq::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "dedupq-test".to_string(),
        log_level: "debug".to_string(),
    };
    // This may return Err if a global subscriber was already set by
    // another test in this process; that is acceptable.
    let _guard = dedupq::telemetry::init_telemetry(config);
}

#[test]
fn item_span_creates_and_records_outcome() {
    let span = dedupq::telemetry::work::start_item_span("pods", 3);
    dedupq::telemetry::work::record_outcome(&span, "ok");
}

#[test]
fn otel_metrics_on_global_provider_record_queue_traffic() {
    let q: DedupQueue<String> = DedupQueue::with_config(
        QueueConfig::named("telemetry-test")
            .clock(Arc::new(RealClock))
            .otel_metrics(),
    );

    q.add("a".to_string());
    let key = q.get().unwrap();
    q.add("a".to_string());
    q.done(&key);
    assert_eq!(q.len(), 1);
    q.shut_down();
    assert_eq!(q.get().as_deref(), Some("a"));
}
