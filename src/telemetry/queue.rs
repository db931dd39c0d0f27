//! Queue span helpers.

use tracing::Span;
use uuid::Uuid;

/// Start a span covering a queue's lifetime activity.
///
/// `queue.capacity` is declared empty and filled by [`record_grow`].
pub fn queue_span(name: &str, queue_id: &Uuid) -> Span {
    tracing::info_span!(
        "workq.queue",
        "queue.name" = name,
        "queue.id" = %queue_id,
        "queue.capacity" = tracing::field::Empty,
    )
}

/// Record a backing-buffer reallocation on the given span.
pub fn record_grow(span: &Span, from: usize, to: usize) {
    span.record("queue.capacity", to);
    span.in_scope(|| {
        tracing::debug!(from, to, "queue_grow");
    });
}

/// Start a span for one consumer run.
pub fn consumer_span(queue_name: &str, consumer_id: &Uuid) -> Span {
    tracing::info_span!(
        "workq.consume",
        "queue.name" = queue_name,
        "consumer.id" = %consumer_id,
    )
}
