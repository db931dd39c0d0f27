//! Growable ring buffer.
//!
//! Slots are addressed with a read cursor and a write cursor modulo the
//! capacity. `read_index == write_index` means empty, so one slot always
//! stays free: a push that would fill the last slot grows the buffer first.
//!
//! This type does no synchronization. [`crate::queue::WorkQueue`] wraps it
//! in a lock for shared use.

use crate::error::{Error, PushError, Result};

/// What a push did to the backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pushed {
    /// Written into existing free space.
    InPlace,
    /// The buffer was reallocated before the write.
    Grew { from: usize, to: usize },
}

/// A FIFO ring buffer that doubles its capacity instead of filling up.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    read_index: usize,
    write_index: usize,
    max_capacity: Option<usize>,
}

impl<T> RingBuffer<T> {
    /// Create a buffer with exactly `initial_capacity` slots.
    ///
    /// # Errors
    ///
    /// `InvalidCapacity` if `initial_capacity` is zero, `Allocation` if the
    /// slots cannot be allocated.
    pub fn with_capacity(initial_capacity: usize) -> Result<Self> {
        if initial_capacity == 0 {
            return Err(Error::InvalidCapacity(initial_capacity));
        }
        Ok(Self {
            slots: allocate_slots(initial_capacity)?,
            read_index: 0,
            write_index: 0,
            max_capacity: None,
        })
    }

    /// Create a buffer that never grows past `max_capacity` slots.
    ///
    /// One slot always stays free, so the buffer holds at most
    /// `max_capacity - 1` items and `max_capacity` must be at least 2.
    pub fn bounded(initial_capacity: usize, max_capacity: usize) -> Result<Self> {
        if max_capacity < 2 {
            return Err(Error::Config(format!(
                "max capacity {max_capacity} leaves no usable slot; it must be at least 2"
            )));
        }
        if max_capacity < initial_capacity {
            return Err(Error::Config(format!(
                "max capacity {max_capacity} is below initial capacity {initial_capacity}"
            )));
        }
        let mut ring = Self::with_capacity(initial_capacity)?;
        ring.max_capacity = Some(max_capacity);
        Ok(ring)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn max_capacity(&self) -> Option<usize> {
        self.max_capacity
    }

    /// Number of items currently enqueued.
    pub fn count(&self) -> usize {
        let capacity = self.capacity();
        (self.write_index + capacity - self.read_index) % capacity
    }

    pub fn is_empty(&self) -> bool {
        self.read_index == self.write_index
    }

    /// Append an item, growing first if the write would fill the buffer.
    ///
    /// # Errors
    ///
    /// Any error comes from the grow step. The buffer is left exactly as it
    /// was and the item is handed back inside the [`PushError`].
    pub fn push(&mut self, item: T) -> std::result::Result<Pushed, PushError<T>> {
        let next = (self.write_index + 1) % self.capacity();
        let pushed = if next == self.read_index {
            match self.grow() {
                Ok((from, to)) => Pushed::Grew { from, to },
                Err(error) => return Err(PushError::new(item, error)),
            }
        } else {
            Pushed::InPlace
        };

        self.slots[self.write_index] = Some(item);
        self.write_index = (self.write_index + 1) % self.capacity();
        Ok(pushed)
    }

    /// Remove the oldest item. `None` means the buffer is empty.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.read_index].take();
        debug_assert!(item.is_some(), "live slot {} was vacant", self.read_index);
        self.read_index = (self.read_index + 1) % self.capacity();
        item
    }

    /// The oldest item, without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.read_index].as_ref()
    }

    /// Remove every item in FIFO order. Capacity is kept.
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.count());
        while let Some(item) = self.pop() {
            items.push(item);
        }
        items
    }

    /// Reallocate at twice the capacity (clamped to the ceiling) and move
    /// live items to `0..count`. Allocation happens before any state change.
    fn grow(&mut self) -> Result<(usize, usize)> {
        let from = self.capacity();
        let doubled = from
            .checked_mul(2)
            .ok_or(Error::CapacityOverflow { capacity: from })?;
        let to = match self.max_capacity {
            Some(max) if from >= max => {
                return Err(Error::CapacityExceeded {
                    capacity: from,
                    max,
                });
            }
            Some(max) => doubled.min(max),
            None => doubled,
        };

        let mut slots = allocate_slots(to)?;
        let count = self.count();
        for (offset, slot) in slots.iter_mut().take(count).enumerate() {
            *slot = self.slots[(self.read_index + offset) % from].take();
        }

        self.slots = slots;
        self.read_index = 0;
        self.write_index = count;
        Ok((from, to))
    }
}

#[cfg(test)]
thread_local! {
    // Allocations above this many slots fail as if the allocator refused them.
    static SLOT_LIMIT: std::cell::Cell<Option<usize>> = const { std::cell::Cell::new(None) };
}

fn allocate_slots<T>(capacity: usize) -> Result<Vec<Option<T>>> {
    #[cfg(test)]
    let reserve = match SLOT_LIMIT.with(|limit| limit.get()) {
        Some(limit) if capacity > limit => usize::MAX,
        _ => capacity,
    };
    #[cfg(not(test))]
    let reserve = capacity;

    let mut slots = Vec::new();
    slots
        .try_reserve_exact(reserve)
        .map_err(|source| Error::Allocation {
            requested: capacity,
            source,
        })?;
    slots.resize_with(capacity, || None);
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pop_leaves_cursors_alone() {
        let mut ring: RingBuffer<u64> = RingBuffer::with_capacity(4).unwrap();
        ring.push(1).unwrap();
        ring.push(2).unwrap();
        ring.pop();
        ring.pop();
        let before = (ring.read_index, ring.write_index);

        for _ in 0..5 {
            assert!(ring.pop().is_none());
        }
        assert_eq!((ring.read_index, ring.write_index), before);
    }

    #[test]
    fn grow_unwraps_items_to_front() {
        let mut ring = RingBuffer::with_capacity(4).unwrap();
        // Move the cursors so live items straddle the end of the buffer.
        for i in 0..3 {
            ring.push(i).unwrap();
        }
        ring.pop();
        ring.pop();
        ring.push(3).unwrap();
        ring.push(4).unwrap();
        assert_eq!(ring.read_index, 2);
        assert_eq!(ring.write_index, 1);

        let pushed = ring.push(5).unwrap();
        assert_eq!(pushed, Pushed::Grew { from: 4, to: 8 });
        assert_eq!(ring.read_index, 0);
        assert_eq!(ring.write_index, 4);
        assert_eq!(ring.drain(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn failed_grow_changes_nothing() {
        let mut ring = RingBuffer::bounded(2, 2).unwrap();
        ring.push(7).unwrap();
        let before = (ring.read_index, ring.write_index, ring.capacity());

        let err = ring.push(8).unwrap_err();
        assert!(err.is_full());
        assert!(matches!(
            err.error(),
            Error::CapacityExceeded { capacity: 2, max: 2 }
        ));
        assert_eq!(err.into_inner(), 8);
        assert_eq!(
            (ring.read_index, ring.write_index, ring.capacity()),
            before
        );
        assert_eq!(ring.pop(), Some(7));
    }

    #[test]
    fn indices_stay_below_capacity() {
        let mut ring = RingBuffer::with_capacity(3).unwrap();
        for round in 0..50u64 {
            ring.push(round).unwrap();
            if round % 3 != 0 {
                ring.pop();
            }
            assert!(ring.read_index < ring.capacity());
            assert!(ring.write_index < ring.capacity());
            assert!(ring.count() < ring.capacity());
        }
    }

    #[test]
    fn oversized_buffer_is_an_allocation_error() {
        let err = RingBuffer::<u64>::with_capacity(usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            Error::Allocation {
                requested: usize::MAX,
                ..
            }
        ));
    }

    #[test]
    fn failed_grow_allocation_changes_nothing() {
        let mut ring = RingBuffer::with_capacity(4).unwrap();
        for i in 0..3u64 {
            ring.push(i).unwrap();
        }
        ring.pop();
        ring.push(3).unwrap();
        let before = (ring.read_index, ring.write_index, ring.capacity());

        SLOT_LIMIT.with(|limit| limit.set(Some(4)));
        let err = ring.push(4).unwrap_err();
        SLOT_LIMIT.with(|limit| limit.set(None));

        assert!(matches!(
            err.error(),
            Error::Allocation { requested: 8, .. }
        ));
        assert!(!err.is_full());
        assert_eq!(err.into_inner(), 4);
        assert_eq!(
            (ring.read_index, ring.write_index, ring.capacity()),
            before
        );
        assert_eq!(ring.drain(), vec![1, 2, 3]);

        // The same push succeeds once memory is available again.
        ring.push(4).unwrap();
        assert_eq!(ring.capacity(), 4);
    }

    #[test]
    fn ceiling_must_leave_a_usable_slot() {
        assert!(matches!(
            RingBuffer::<u64>::bounded(1, 1),
            Err(Error::Config(_))
        ));
        let mut ring = RingBuffer::bounded(1, 2).unwrap();
        ring.push(1u64).unwrap();
        assert_eq!(ring.capacity(), 2);
        assert!(ring.push(2).unwrap_err().is_full());
    }
}
