//! Error types for workq.

use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid queue capacity {0}: must be at least 1")]
    InvalidCapacity(usize),

    #[error("failed to allocate {requested} queue slots")]
    Allocation {
        requested: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("queue capacity {capacity} cannot be doubled without overflow")]
    CapacityOverflow { capacity: usize },

    #[error("queue is at its maximum capacity of {max} slots (current {capacity})")]
    CapacityExceeded { capacity: usize, max: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A rejected push. Carries the item back so the caller can retry it.
pub struct PushError<T> {
    item: T,
    error: Error,
}

impl<T> PushError<T> {
    pub(crate) fn new(item: T, error: Error) -> Self {
        Self { item, error }
    }

    /// Whether the push failed only because the growth ceiling was reached.
    pub fn is_full(&self) -> bool {
        matches!(self.error, Error::CapacityExceeded { .. })
    }

    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Recover the item that was not stored.
    pub fn into_inner(self) -> T {
        self.item
    }

    pub fn into_error(self) -> Error {
        self.error
    }
}

impl<T> std::fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> std::fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "push rejected: {}", self.error)
    }
}

impl<T> std::error::Error for PushError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<T> From<PushError<T>> for Error {
    fn from(e: PushError<T>) -> Self {
        e.error
    }
}
