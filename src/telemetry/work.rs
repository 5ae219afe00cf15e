//! Span helpers for consumers processing queue keys.

use tracing::Span;

/// Start a span covering one handler invocation for a dequeued key.
///
/// The `item.outcome` field is declared empty and filled by
/// [`record_outcome`].
pub fn start_item_span(queue: &str, worker: usize) -> Span {
    tracing::info_span!(
        "queue.process",
        "queue.name" = queue,
        "queue.worker" = worker,
        "item.outcome" = tracing::field::Empty,
    )
}

/// Record how a handler invocation ended ("ok" | "error" | "panic").
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("item.outcome", outcome);
}
