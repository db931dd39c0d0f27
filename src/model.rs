//! Core data model.
//!
//! A work item is an opaque tagged payload handed from a producer to a
//! consumer. Messages wrap items so that termination is its own variant.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A unit of work moved through a queue.
///
/// The queue owns the item, payload bytes included, from push until pop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Producer-assigned tag. Not required to be unique; zero is a valid tag.
    pub tag: u64,

    /// Opaque payload. Length is explicit, no terminator.
    pub payload: Vec<u8>,
}

impl WorkItem {
    pub fn new(tag: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// An item carrying only a tag.
    pub fn tagged(tag: u64) -> Self {
        Self {
            tag,
            payload: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// What a consumer receives from a `WorkQueue<Message>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Work to process.
    Data(WorkItem),
    /// No more work follows; the consumer should exit.
    Stop,
}

impl Message {
    pub fn is_stop(&self) -> bool {
        matches!(self, Message::Stop)
    }

    /// The carried item, if this is a data message.
    pub fn into_item(self) -> Option<WorkItem> {
        match self {
            Message::Data(item) => Some(item),
            Message::Stop => None,
        }
    }
}

impl From<WorkItem> for Message {
    fn from(item: WorkItem) -> Self {
        Message::Data(item)
    }
}
