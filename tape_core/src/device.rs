//! Device-side tape images.
//!
//! A [`DeviceTape`] is what a parallel recording pass writes into: a copy of
//! the host header plus a buffer covering the host's free slots. Every lane
//! reserves through one atomic tally, the merge counter, so reservation `k`
//! owns slot `base.stack_cursor + k` and id `base.next_id + k`. After the
//! pass, [`DeviceTape::download`] copies the written entries back as raw
//! bytes and hands the tally to the host, and [`Tape::reconcile`] folds it
//! into the host counters.
//!
//! ```
//! use tape_core::{ops, DeviceTape, Tape};
//!
//! let mut tape = Tape::new(64);
//! let a = tape.variable(3.0);
//!
//! let device = DeviceTape::upload(&tape).unwrap();
//! let b = ops::mul(&device, a, a);
//! assert_eq!(device.len(), 1);
//!
//! assert_eq!(device.download(&mut tape).unwrap(), 1);
//! tape.reconcile();
//! assert_eq!(tape.gradient().unwrap().wrt(a), 6.0);
//! # let _ = b;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::alloc::SlotAllocator;
use crate::entry::{Entry, Pair, TapeHeader, VarId, UNTRACKED};
use crate::error::{Result, TapeError};
use crate::recorder::Recorder;
use crate::slots::SlotBuffer;
use crate::tape::Tape;

/// Recording image of a host tape, shared by concurrent lanes.
#[derive(Debug)]
pub struct DeviceTape {
    base: TapeHeader,
    merge_counter: AtomicU32,
    slots: SlotBuffer,
    overflowed: AtomicBool,
}

impl DeviceTape {
    /// Snapshot `tape` with room for all of its free slots.
    pub fn upload<A: SlotAllocator>(tape: &Tape<A>) -> Result<Self> {
        Self::upload_bounded(tape, u32::MAX)
    }

    /// Snapshot `tape` with room for at most `budget` entries.
    ///
    /// Fails if the tape still has an unreconciled device pass.
    pub fn upload_bounded<A: SlotAllocator>(tape: &Tape<A>, budget: u32) -> Result<Self> {
        let base = tape.header();
        if base.merge_counter != 0 {
            return Err(TapeError::PendingReconcile {
                merge_counter: base.merge_counter,
            });
        }
        let free = base.capacity - base.stack_cursor;
        let slots = free.min(budget);
        log::debug!(
            "device upload: cursor {}, next id {}, {} slots",
            base.stack_cursor,
            base.next_id,
            slots
        );
        Ok(DeviceTape {
            base,
            merge_counter: AtomicU32::new(0),
            slots: SlotBuffer::new(slots as usize),
            overflowed: AtomicBool::new(false),
        })
    }

    /// Header of the host tape at upload time.
    pub fn base(&self) -> TapeHeader {
        self.base
    }

    /// Number of entries the image can hold.
    pub fn slot_count(&self) -> u32 {
        self.slots.capacity() as u32
    }

    /// Entries reserved so far.
    pub fn len(&self) -> u32 {
        self.merge_counter.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Relaxed)
    }

    /// Reserve the next local slot, or `None` when the image is full.
    fn reserve(&self) -> Option<u32> {
        let limit = self.slot_count();
        let reserved = self
            .merge_counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |k| {
                (k < limit).then_some(k + 1)
            })
            .ok();
        if reserved.is_none() && !self.overflowed.swap(true, Ordering::Relaxed) {
            log::error!("device image of {limit} slots exhausted; further lane operations are not recorded");
        }
        reserved
    }

    fn write(&self, k: u32, entry: Entry) {
        // SAFETY: `k` came from the merge counter, which hands out each local
        // slot once; reads only happen in `download`, which consumes `self`.
        unsafe { self.slots.write(k as usize, entry) }
    }

    /// Copy the recorded entries into `tape` and record the tally.
    ///
    /// The entries land in the host slots starting at the uploaded cursor.
    /// The host counters are left untouched until [`Tape::reconcile`].
    /// Returns the number of entries transferred.
    pub fn download<A: SlotAllocator>(mut self, tape: &mut Tape<A>) -> Result<u32> {
        let now = tape.header();
        if now.merge_counter != 0 {
            return Err(TapeError::PendingReconcile {
                merge_counter: now.merge_counter,
            });
        }
        if now.stack_cursor != self.base.stack_cursor || now.next_id != self.base.next_id {
            return Err(TapeError::StaleImage {
                expected_cursor: self.base.stack_cursor,
                found_cursor: now.stack_cursor,
            });
        }

        let count = *self.merge_counter.get_mut();
        let start = self.base.stack_cursor as usize;
        let end = start + count as usize;

        let src: &[u8] = bytemuck::cast_slice(&self.slots.as_slice()[..count as usize]);
        let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut tape.slots_mut()[start..end]);
        dst.copy_from_slice(src);

        tape.set_merge_counter(count);
        if *self.overflowed.get_mut() {
            tape.mark_overflow();
        }
        log::debug!("device download: {count} entries into slots {start}..{end}");
        Ok(count)
    }
}

impl Recorder for DeviceTape {
    fn is_recording(&self) -> bool {
        self.base.is_recording()
    }

    fn push(&self, pairs: &[Pair]) -> VarId {
        match self.reserve() {
            Some(k) => {
                let id = self.base.next_id + k;
                self.write(k, Entry::new(id, pairs));
                id
            }
            None => UNTRACKED,
        }
    }

    /// Accumulating on a device also consumes one id: reservation `k` always
    /// owns id `base.next_id + k`, used or not.
    fn push_into(&self, id: VarId, pairs: &[Pair]) {
        if let Some(k) = self.reserve() {
            self.write(k, Entry::new(id, pairs));
        }
    }
}
