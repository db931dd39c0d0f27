//! Shared work queue handle.
//!
//! A `WorkQueue` is cloned and handed to each producer and consumer task.
//! Every ring operation, grow included, runs under one mutex. A push wakes
//! one waiting consumer; a pop wakes producers waiting on a full bounded
//! queue.

use crate::config::QueueConfig;
use crate::error::{PushError, Result};
use crate::model::{Message, WorkItem};
use crate::ring::{Pushed, RingBuffer};
use crate::telemetry::metrics::QueueInstruments;
use crate::telemetry::queue::{queue_span, record_grow};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{Span, debug};
use uuid::Uuid;

/// Point-in-time view of a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub name: String,
    pub capacity: usize,
    pub count: usize,
    pub pushed: u64,
    pub popped: u64,
    pub grows: u64,
}

struct Shared<T> {
    id: Uuid,
    name: String,
    ring: Mutex<RingBuffer<T>>,
    ready: Notify,
    space: Notify,
    pushed: AtomicU64,
    popped: AtomicU64,
    grows: AtomicU64,
    instruments: QueueInstruments,
    span: Span,
}

/// A FIFO queue shared between producers and consumers.
pub struct WorkQueue<T = Message> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

impl<T> WorkQueue<T> {
    /// Build a queue from validated configuration.
    pub fn new(config: &QueueConfig) -> Result<Self> {
        config.validate()?;
        let ring = match config.max_capacity {
            Some(max) => RingBuffer::bounded(config.initial_capacity, max)?,
            None => RingBuffer::with_capacity(config.initial_capacity)?,
        };
        Ok(Self::from_ring(&config.name, ring))
    }

    /// An unbounded queue named after the default, with `initial_capacity` slots.
    pub fn with_capacity(initial_capacity: usize) -> Result<Self> {
        let ring = RingBuffer::with_capacity(initial_capacity)?;
        Ok(Self::from_ring(crate::config::DEFAULT_QUEUE_NAME, ring))
    }

    fn from_ring(name: &str, ring: RingBuffer<T>) -> Self {
        let id = Uuid::new_v4();
        let span = queue_span(name, &id);
        span.record("queue.capacity", ring.capacity());
        Self {
            shared: Arc::new(Shared {
                id,
                name: name.to_string(),
                ring: Mutex::new(ring),
                ready: Notify::new(),
                space: Notify::new(),
                pushed: AtomicU64::new(0),
                popped: AtomicU64::new(0),
                grows: AtomicU64::new(0),
                instruments: QueueInstruments::new(name),
                span,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Append an item. Grows instead of blocking when the buffer is full.
    ///
    /// # Errors
    ///
    /// `Allocation`, `CapacityOverflow` or `CapacityExceeded` if a needed
    /// grow fails. The queue is unchanged and the item comes back in the
    /// error.
    pub fn push(&self, item: T) -> std::result::Result<(), PushError<T>> {
        let pushed = self.lock().push(item);
        match pushed {
            Ok(Pushed::InPlace) => {}
            Ok(Pushed::Grew { from, to }) => {
                self.shared.grows.fetch_add(1, Ordering::Relaxed);
                self.shared.instruments.grow();
                record_grow(&self.shared.span, from, to);
            }
            Err(e) => return Err(e),
        }
        self.shared.pushed.fetch_add(1, Ordering::Relaxed);
        self.shared.instruments.operation("push", 1);
        self.shared.ready.notify_one();
        Ok(())
    }

    /// Append an item, waiting for a pop whenever the queue sits at its
    /// growth ceiling. Unbounded queues never wait.
    ///
    /// # Errors
    ///
    /// Any push failure other than the ceiling (allocation, overflow).
    pub async fn push_wait(&self, mut item: T) -> std::result::Result<(), PushError<T>> {
        loop {
            // Registered before the push so a pop in between is not missed.
            let space = self.shared.space.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            match self.push(item) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_full() => {
                    debug!(queue = %self.shared.name, "queue at capacity ceiling, waiting for space");
                    item = e.into_inner();
                    space.await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Take the oldest item, or `None` if the queue is empty. Never waits.
    pub fn pop(&self) -> Option<T> {
        let item = self.lock().pop();
        if item.is_some() {
            self.shared.popped.fetch_add(1, Ordering::Relaxed);
            self.shared.instruments.operation("pop", 1);
            self.shared.space.notify_waiters();
        }
        item
    }

    /// Wait until an item is available, then take it.
    pub async fn recv(&self) -> T {
        loop {
            if let Some(item) = self.pop() {
                return item;
            }
            self.shared.ready.notified().await;
        }
    }

    /// Resolves after the next push (or immediately if a push notification
    /// is already pending).
    pub async fn ready(&self) {
        self.shared.ready.notified().await;
    }

    /// Take every queued item in FIFO order.
    pub fn drain(&self) -> Vec<T> {
        let items = self.lock().drain();
        if !items.is_empty() {
            let n = items.len() as u64;
            self.shared.popped.fetch_add(n, Ordering::Relaxed);
            self.shared.instruments.operation("drain", n);
            self.shared.space.notify_waiters();
        }
        items
    }

    pub fn count(&self) -> usize {
        self.lock().count()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        let (capacity, count) = {
            let ring = self.lock();
            (ring.capacity(), ring.count())
        };
        QueueStats {
            name: self.shared.name.clone(),
            capacity,
            count,
            pushed: self.shared.pushed.load(Ordering::Relaxed),
            popped: self.shared.popped.load(Ordering::Relaxed),
            grows: self.shared.grows.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_handled(&self, ok: bool) {
        self.shared.instruments.handled(ok);
    }

    // Ring methods finish their mutation before anything can panic, so the
    // state behind a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, RingBuffer<T>> {
        self.shared
            .ring
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> WorkQueue<T> {
    /// A copy of the oldest item, without removing it.
    pub fn peek(&self) -> Option<T> {
        self.lock().peek().cloned()
    }
}

impl WorkQueue<Message> {
    /// Push a data message.
    pub fn submit(&self, item: WorkItem) -> Result<()> {
        Ok(self.push(Message::Data(item))?)
    }

    /// Push a data message, waiting for space at the growth ceiling.
    pub async fn submit_wait(&self, item: WorkItem) -> Result<()> {
        Ok(self.push_wait(Message::Data(item)).await?)
    }

    /// Push the termination message. Consumers exit when they reach it.
    pub fn stop(&self) -> Result<()> {
        Ok(self.push(Message::Stop)?)
    }

    /// Push the termination message, waiting for space at the ceiling.
    pub async fn stop_wait(&self) -> Result<()> {
        Ok(self.push_wait(Message::Stop).await?)
    }
}
