//! Integration tests for telemetry initialization and span helpers.

use uuid::Uuid;

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process, so a second
    // init in the same test binary may return Err; that is acceptable.
    let config = workq::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "workq-test".to_string(),
        default_level: "debug".to_string(),
    };
    if let Ok(guard) = workq::telemetry::init_telemetry(config) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn growing_queue_records_each_grow() {
    let span = workq::telemetry::queue::queue_span("work", &Uuid::new_v4());
    workq::telemetry::queue::record_grow(&span, 4, 8);

    let queue: workq::WorkQueue<u64> = workq::WorkQueue::with_capacity(1).unwrap();
    for n in 0..16 {
        queue.push(n).unwrap();
    }
    let stats = queue.stats();
    assert_eq!(stats.grows, 5);
    assert_eq!(stats.capacity, 32);
    assert_eq!(stats.count, 16);
}
