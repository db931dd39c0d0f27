//! Metric instrument factories for workq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a registered provider the instruments are no-ops.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("workq")
}

/// Counter: queue operations.
/// Labels: `queue`, `operation` ("push" | "pop" | "drain").
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("workq.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

/// Counter: backing-buffer reallocations.
/// Labels: `queue`.
pub fn queue_grows() -> Counter<u64> {
    meter()
        .u64_counter("workq.queue.grows")
        .with_description("Number of times a queue grew its backing buffer")
        .build()
}

/// Counter: messages handled by consumers.
/// Labels: `queue`, `result` ("ok" | "error").
pub fn consumer_handled() -> Counter<u64> {
    meter()
        .u64_counter("workq.consumer.handled")
        .with_description("Number of work items handled by consumers")
        .build()
}

/// Instruments held by one queue, labelled with its name.
pub(crate) struct QueueInstruments {
    operations: Counter<u64>,
    grows: Counter<u64>,
    handled: Counter<u64>,
    queue: KeyValue,
}

impl QueueInstruments {
    pub(crate) fn new(queue_name: &str) -> Self {
        Self {
            operations: queue_operations(),
            grows: queue_grows(),
            handled: consumer_handled(),
            queue: KeyValue::new("queue", queue_name.to_string()),
        }
    }

    pub(crate) fn operation(&self, operation: &'static str, n: u64) {
        self.operations.add(
            n,
            &[self.queue.clone(), KeyValue::new("operation", operation)],
        );
    }

    pub(crate) fn grow(&self) {
        self.grows.add(1, std::slice::from_ref(&self.queue));
    }

    pub(crate) fn handled(&self, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        self.handled
            .add(1, &[self.queue.clone(), KeyValue::new("result", result)]);
    }
}
