//! Consumer loop: drains a queue into a handler until told to stop.

use crate::error::Result;
use crate::model::{Message, WorkItem};
use crate::queue::WorkQueue;
use crate::telemetry::queue::consumer_span;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{Instrument, error, info};
use uuid::Uuid;

/// Why a consumer returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A `Message::Stop` was popped.
    StopMessage,
    /// The consumer's [`ShutdownHandle`] was triggered.
    Shutdown,
}

/// Summary of one consumer run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerReport {
    pub processed: u64,
    pub failed: u64,
    pub stopped_by: StopReason,
}

/// Tells one or more consumers to return.
///
/// One-shot: once triggered it stays triggered. Every consumer built on the
/// same handle sees it, whether it is waiting or mid-drain.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    inner: Arc<ShutdownState>,
}

#[derive(Debug, Default)]
struct ShutdownState {
    requested: AtomicBool,
    notify: Notify,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.requested.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }
}

/// Pops messages from a queue and feeds data items to a handler.
pub struct Consumer {
    id: Uuid,
    queue: WorkQueue<Message>,
    poll_interval: Duration,
    shutdown: ShutdownHandle,
}

impl Consumer {
    pub fn new(queue: WorkQueue<Message>, poll_interval: Duration) -> Self {
        Self::with_shutdown(queue, poll_interval, ShutdownHandle::new())
    }

    /// A consumer that stops when `shutdown` is triggered. Share one handle
    /// across consumers to stop them together.
    pub fn with_shutdown(
        queue: WorkQueue<Message>,
        poll_interval: Duration,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue,
            poll_interval,
            shutdown,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// A handle that can stop this consumer from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the consumer to return. Checked before every pop, so items
    /// still queued stay queued.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Run until a `Stop` message or shutdown.
    ///
    /// Handler errors are logged and counted; they do not end the run.
    pub async fn run<F>(&self, mut handler: F) -> ConsumerReport
    where
        F: FnMut(WorkItem) -> Result<()>,
    {
        let span = consumer_span(self.queue.name(), &self.id);
        async {
            info!("consumer started");
            let mut processed = 0u64;
            let mut failed = 0u64;

            loop {
                if self.shutdown.is_triggered() {
                    info!(processed, failed, remaining = self.queue.count(), "consumer shutting down");
                    return ConsumerReport {
                        processed,
                        failed,
                        stopped_by: StopReason::Shutdown,
                    };
                }

                if let Some(message) = self.queue.pop() {
                    let item = match message {
                        Message::Data(item) => item,
                        Message::Stop => {
                            info!(processed, failed, "consumer received stop");
                            return ConsumerReport {
                                processed,
                                failed,
                                stopped_by: StopReason::StopMessage,
                            };
                        }
                    };

                    let tag = item.tag;
                    match handler(item) {
                        Ok(()) => {
                            processed += 1;
                            self.queue.record_handled(true);
                        }
                        Err(e) => {
                            failed += 1;
                            self.queue.record_handled(false);
                            error!(tag, "handler error: {e}");
                        }
                    }
                    continue;
                }

                // Registered before the flag check so a trigger in between
                // still wakes this wait.
                let shutdown = self.shutdown.inner.notify.notified();
                tokio::pin!(shutdown);
                shutdown.as_mut().enable();
                if self.shutdown.is_triggered() {
                    continue;
                }

                tokio::select! {
                    _ = &mut shutdown => {}
                    _ = self.queue.ready() => {}
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }
        .instrument(span)
        .await
    }
}
