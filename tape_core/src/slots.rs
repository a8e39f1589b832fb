//! Fixed-capacity entry storage that tolerates concurrent writes to distinct slots.

use std::cell::UnsafeCell;

use bytemuck::Zeroable;

use crate::entry::Entry;

/// Preallocated entry buffer.
///
/// Writers go through [`SlotBuffer::write`], whose contract is that no two
/// writers ever target the same slot and nobody reads while writers are
/// active. Both are guaranteed by the owners: slots come from an allocator
/// that never hands out the same index twice, and every read path borrows
/// the owner mutably.
pub(crate) struct SlotBuffer {
    cells: Box<[UnsafeCell<Entry>]>,
}

// SAFETY: concurrent access is limited to `write` on distinct slots (see the
// type-level contract); reads require `&mut self`.
unsafe impl Sync for SlotBuffer {}

impl SlotBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        let cells = (0..capacity)
            .map(|_| UnsafeCell::new(Entry::zeroed()))
            .collect();
        SlotBuffer { cells }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Write `entry` into `slot`.
    ///
    /// # Safety
    /// `slot` must have been reserved exclusively by the caller for the
    /// current epoch, and no reference obtained from `as_slice`/`as_mut_slice`
    /// may be alive.
    pub(crate) unsafe fn write(&self, slot: usize, entry: Entry) {
        *self.cells[slot].get() = entry;
    }

    pub(crate) fn as_slice(&mut self) -> &[Entry] {
        self.as_mut_slice()
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Entry] {
        let len = self.cells.len();
        let ptr = self.cells.as_mut_ptr() as *mut Entry;
        // SAFETY: `UnsafeCell<Entry>` has the same layout as `Entry`, and the
        // exclusive borrow rules out concurrent writers.
        unsafe { std::slice::from_raw_parts_mut(ptr, len) }
    }

    /// Zero the slots in `range`.
    pub(crate) fn clear(&mut self, range: std::ops::Range<usize>) {
        self.as_mut_slice()[range].fill(Entry::zeroed());
    }
}

impl std::fmt::Debug for SlotBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotBuffer")
            .field("capacity", &self.capacity())
            .finish()
    }
}
