//! # workq
//!
//! In-process FIFO work queue built on a growable ring buffer.
//!
//! Producers and consumers share a [`queue::WorkQueue`] handle. The buffer
//! doubles its capacity before a push would fill it, so pushes never block
//! and pops return `None` on an empty queue instead of waiting.

pub mod config;
pub mod error;
pub mod model;
pub mod queue;
pub mod ring;
pub mod telemetry;
pub mod worker;

pub use error::{Error, PushError, Result};
pub use model::{Message, WorkItem};
pub use queue::{QueueStats, WorkQueue};
pub use ring::{Pushed, RingBuffer};
pub use worker::{Consumer, ConsumerReport, ShutdownHandle, StopReason};
