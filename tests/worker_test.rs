//! Integration tests for the consumer loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use workq::{Consumer, Error, ShutdownHandle, StopReason, WorkItem, WorkQueue};

fn test_queue() -> WorkQueue {
    WorkQueue::with_capacity(2).expect("failed to create queue")
}

#[tokio::test]
async fn consumer_handles_items_until_stop() {
    let queue = test_queue();
    for tag in 0..5 {
        queue.submit(WorkItem::new(tag, vec![0u8; tag as usize])).unwrap();
    }
    queue.stop().unwrap();
    // Anything behind the stop message is left for the next consumer.
    queue.submit(WorkItem::tagged(99)).unwrap();

    let consumer = Consumer::new(queue.clone(), Duration::from_millis(10));
    let mut tags = Vec::new();
    let report = consumer
        .run(|item| {
            assert_eq!(item.len() as u64, item.tag);
            tags.push(item.tag);
            Ok(())
        })
        .await;

    assert_eq!(tags, vec![0, 1, 2, 3, 4]);
    assert_eq!(report.processed, 5);
    assert_eq!(report.failed, 0);
    assert_eq!(report.stopped_by, StopReason::StopMessage);
    assert_eq!(queue.count(), 1);
}

#[tokio::test]
async fn handler_errors_are_counted_not_fatal() {
    let queue = test_queue();
    for tag in 0..6 {
        queue.submit(WorkItem::tagged(tag)).unwrap();
    }
    queue.stop().unwrap();

    let consumer = Consumer::new(queue, Duration::from_millis(10));
    let report = consumer
        .run(|item| {
            if item.tag % 2 == 0 {
                Err(Error::Other(format!("rejected {}", item.tag)))
            } else {
                Ok(())
            }
        })
        .await;

    assert_eq!(report.processed, 3);
    assert_eq!(report.failed, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn consumer_picks_up_items_pushed_while_waiting() {
    let queue = test_queue();
    let consumer = Consumer::new(queue.clone(), Duration::from_secs(30));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let handle = tokio::spawn(async move {
        consumer
            .run(move |item| {
                sink.lock().unwrap().push(item.tag);
                Ok(())
            })
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    for tag in 10..20 {
        queue.submit(WorkItem::tagged(tag)).unwrap();
    }
    queue.stop().unwrap();

    // Poll interval is long, so finishing quickly means push notifications woke it.
    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("consumer should finish after stop")
        .unwrap();

    assert_eq!(report.processed, 10);
    assert_eq!(*seen.lock().unwrap(), (10..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn shutdown_while_idle_returns() {
    let queue = test_queue();
    let consumer = Consumer::new(queue.clone(), Duration::from_secs(30));

    let ctrl = consumer.shutdown_handle();
    let handle = tokio::spawn(async move { consumer.run(|_| Ok(())).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    ctrl.trigger();
    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("consumer should exit on shutdown")
        .unwrap();

    assert_eq!(report.stopped_by, StopReason::Shutdown);
    assert_eq!(report.processed, 0);
}

#[tokio::test]
async fn shutdown_leaves_queued_items_queued() {
    let queue = test_queue();
    for tag in 0..100 {
        queue.submit(WorkItem::tagged(tag)).unwrap();
    }

    let consumer = Consumer::new(queue.clone(), Duration::from_millis(10));
    consumer.shutdown();
    let report = consumer.run(|_| Ok(())).await;

    assert_eq!(report.stopped_by, StopReason::Shutdown);
    assert_eq!(report.processed, 0);
    assert_eq!(queue.count(), 100);
}

#[tokio::test]
async fn shutdown_mid_drain_stops_at_next_pop() {
    let queue = test_queue();
    for tag in 0..100 {
        queue.submit(WorkItem::tagged(tag)).unwrap();
    }

    let consumer = Consumer::new(queue.clone(), Duration::from_millis(10));
    let ctrl = consumer.shutdown_handle();
    let report = consumer
        .run(|item| {
            if item.tag == 9 {
                ctrl.trigger();
            }
            Ok(())
        })
        .await;

    assert_eq!(report.stopped_by, StopReason::Shutdown);
    assert_eq!(report.processed, 10);
    assert_eq!(queue.count(), 90);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shared_handle_stops_every_consumer() {
    let queue = test_queue();
    let shutdown = ShutdownHandle::new();
    let first = Consumer::with_shutdown(queue.clone(), Duration::from_secs(30), shutdown.clone());
    let second = Consumer::with_shutdown(queue.clone(), Duration::from_secs(30), shutdown.clone());
    assert_ne!(first.id(), second.id());

    let a = tokio::spawn(async move { first.run(|_| Ok(())).await });
    let b = tokio::spawn(async move { second.run(|_| Ok(())).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.trigger();

    for handle in [a, b] {
        let report = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("every consumer should exit")
            .unwrap();
        assert_eq!(report.stopped_by, StopReason::Shutdown);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bounded_queue_producers_wait_for_space() {
    let config = workq::config::QueueConfig {
        initial_capacity: 2,
        max_capacity: Some(8),
        ..Default::default()
    };
    let queue: WorkQueue = WorkQueue::new(&config).unwrap();
    let consumer = Consumer::new(queue.clone(), Duration::from_millis(10));
    let consume = tokio::spawn(async move { consumer.run(|_| Ok(())).await });

    let mut producers = Vec::new();
    for p in 0..4u64 {
        let queue = queue.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..500 {
                queue.submit_wait(WorkItem::tagged(p * 500 + i)).await.unwrap();
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    queue.stop_wait().await.unwrap();

    let report = tokio::time::timeout(Duration::from_secs(10), consume)
        .await
        .expect("consumer should finish after stop")
        .unwrap();
    assert_eq!(report.processed, 2000);
    assert_eq!(report.stopped_by, StopReason::StopMessage);
    assert!(queue.capacity() <= 8);
}
