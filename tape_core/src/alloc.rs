//! Slot allocation strategies.
//!
//! An allocator hands out tape cursor positions and value ids. The strategy
//! is the tape's type parameter, so whether a tape may be shared between
//! lanes is decided by the compiler: [`Sequential`] is `!Sync`, [`Atomic`]
//! is `Sync`.

use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::entry::VarId;

/// Runtime name of an allocation strategy, as found in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStrategy {
    /// Plain increments; one thread of control records at a time.
    #[default]
    Sequential,
    /// Fetch-and-add; any number of lanes record concurrently.
    Atomic,
}

impl std::fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationStrategy::Sequential => write!(f, "sequential"),
            AllocationStrategy::Atomic => write!(f, "atomic"),
        }
    }
}

/// A reserved tape position together with the id of the value written there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub index: u32,
    pub id: VarId,
}

/// Counter pair behind a tape: the write cursor and the next free id.
pub trait SlotAllocator: Send + 'static {
    /// The strategy this allocator implements.
    const STRATEGY: AllocationStrategy;

    /// Create an allocator with cursor 0 and the given first id.
    fn new(next_id: VarId) -> Self;

    /// Reserve one cursor position below `capacity`.
    ///
    /// Returns `None` without advancing when the tape is full.
    fn reserve_slot(&self, capacity: u32) -> Option<u32>;

    /// Reserve one fresh id.
    fn reserve_id(&self) -> VarId;

    /// Current cursor (number of reserved slots).
    fn cursor(&self) -> u32;

    /// Next id to be handed out.
    fn next_id(&self) -> VarId;

    /// Overwrite both counters. Only callable with exclusive access.
    fn rewind(&mut self, cursor: u32, next_id: VarId);
}

/// Plain post-increment allocation.
#[derive(Debug)]
pub struct Sequential {
    cursor: Cell<u32>,
    next_id: Cell<VarId>,
}

impl SlotAllocator for Sequential {
    const STRATEGY: AllocationStrategy = AllocationStrategy::Sequential;

    fn new(next_id: VarId) -> Self {
        Sequential {
            cursor: Cell::new(0),
            next_id: Cell::new(next_id),
        }
    }

    fn reserve_slot(&self, capacity: u32) -> Option<u32> {
        let cursor = self.cursor.get();
        if cursor >= capacity {
            return None;
        }
        self.cursor.set(cursor + 1);
        Some(cursor)
    }

    fn reserve_id(&self) -> VarId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn cursor(&self) -> u32 {
        self.cursor.get()
    }

    fn next_id(&self) -> VarId {
        self.next_id.get()
    }

    fn rewind(&mut self, cursor: u32, next_id: VarId) {
        self.cursor.set(cursor);
        self.next_id.set(next_id);
    }
}

/// Lock-free fetch-and-add allocation.
///
/// The cursor and the id counter are independent atomics. A slot and an id
/// reserved back to back by one lane are each unique, but another lane may
/// interleave between the two reservations.
#[derive(Debug)]
pub struct Atomic {
    cursor: AtomicU32,
    next_id: AtomicU32,
}

impl SlotAllocator for Atomic {
    const STRATEGY: AllocationStrategy = AllocationStrategy::Atomic;

    fn new(next_id: VarId) -> Self {
        Atomic {
            cursor: AtomicU32::new(0),
            next_id: AtomicU32::new(next_id),
        }
    }

    fn reserve_slot(&self, capacity: u32) -> Option<u32> {
        // Bounded increment: a full tape never moves its cursor past capacity.
        self.cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                (c < capacity).then_some(c + 1)
            })
            .ok()
    }

    fn reserve_id(&self) -> VarId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn cursor(&self) -> u32 {
        self.cursor.load(Ordering::Relaxed)
    }

    fn next_id(&self) -> VarId {
        self.next_id.load(Ordering::Relaxed)
    }

    fn rewind(&mut self, cursor: u32, next_id: VarId) {
        *self.cursor.get_mut() = cursor;
        *self.next_id.get_mut() = next_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_post_increment() {
        let alloc = Sequential::new(1);
        assert_eq!(alloc.reserve_slot(10), Some(0));
        assert_eq!(alloc.reserve_id(), 1);
        assert_eq!(alloc.reserve_slot(10), Some(1));
        assert_eq!(alloc.reserve_id(), 2);
        assert_eq!(alloc.cursor(), 2);
        assert_eq!(alloc.next_id(), 3);
    }

    #[test]
    fn test_bounded_at_capacity() {
        let seq = Sequential::new(1);
        let atomic = Atomic::new(1);
        for _ in 0..3 {
            assert!(seq.reserve_slot(3).is_some());
            assert!(atomic.reserve_slot(3).is_some());
        }
        assert_eq!(seq.reserve_slot(3), None);
        assert_eq!(atomic.reserve_slot(3), None);
        // Rejected reservations leave the cursor at capacity
        assert_eq!(seq.cursor(), 3);
        assert_eq!(atomic.cursor(), 3);
    }

    #[test]
    fn test_rewind() {
        let mut alloc = Atomic::new(1);
        alloc.reserve_slot(10);
        alloc.reserve_id();
        alloc.rewind(0, 42);
        assert_eq!(alloc.cursor(), 0);
        assert_eq!(alloc.reserve_id(), 42);
    }

    #[test]
    fn test_atomic_unique_across_threads() {
        let alloc = Atomic::new(1);
        let per_thread = 1000;
        let threads = 8;

        let reserved: Vec<(u32, VarId)> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        (0..per_thread)
                            .map(|_| (alloc.reserve_slot(u32::MAX).unwrap(), alloc.reserve_id()))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });

        let slots: HashSet<u32> = reserved.iter().map(|(s, _)| *s).collect();
        let ids: HashSet<VarId> = reserved.iter().map(|(_, id)| *id).collect();
        let total = (threads * per_thread) as u32;
        assert_eq!(slots.len() as u32, total);
        assert_eq!(ids.len() as u32, total);
        assert_eq!(slots, (0..total).collect());
        assert_eq!(ids, (1..=total).collect());
    }

    #[test]
    fn test_strategy_serde_names() {
        let s: AllocationStrategy = serde_json::from_str("\"atomic\"").unwrap();
        assert_eq!(s, AllocationStrategy::Atomic);
        assert_eq!(AllocationStrategy::Sequential.to_string(), "sequential");
    }
}
