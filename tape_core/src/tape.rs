//! The tape: a preallocated arena of entries plus the counters that index it.
//!
//! A tape lives for many recording epochs. Each epoch records forward
//! computations, runs one reverse pass, then rewinds with [`Tape::reset`] to a
//! caller-chosen id base so that independent variables keep their ids.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::alloc::{Atomic, AllocationStrategy, Sequential, Slot, SlotAllocator};
use crate::backward::{self, Gradient};
use crate::config::{TapeConfig, ZeroAdjoint};
use crate::entry::{Entry, Pair, TapeHeader, Value, VarId, FIRST_ID, UNTRACKED};
use crate::error::{Result, TapeError};
use crate::recorder::Recorder;
use crate::slots::SlotBuffer;

/// Linear tape of recorded operations.
///
/// The allocator type parameter fixes the allocation strategy for the
/// tape's whole life. `Tape<Sequential>` is `!Sync` and records from one
/// thread; `Tape<Atomic>` is `Sync` and can be shared by concurrent lanes.
#[derive(Debug)]
pub struct Tape<A: SlotAllocator = Sequential> {
    slots: SlotBuffer,
    alloc: A,
    capacity: u32,
    recording: bool,
    merge_counter: u32,
    overflowed: AtomicBool,
    zero_adjoint: ZeroAdjoint,
}

impl Tape<Sequential> {
    /// Create a single-threaded tape holding up to `capacity` entries.
    pub fn new(capacity: u32) -> Self {
        Self::with_capacity(capacity)
    }
}

impl Tape<Atomic> {
    /// Create a tape that concurrent lanes can record into.
    pub fn atomic(capacity: u32) -> Self {
        Self::with_capacity(capacity)
    }
}

impl<A: SlotAllocator> Tape<A> {
    /// Create a tape with the given capacity and default settings.
    pub fn with_capacity(capacity: u32) -> Self {
        Tape {
            slots: SlotBuffer::new(capacity as usize),
            alloc: A::new(FIRST_ID),
            capacity,
            recording: true,
            merge_counter: 0,
            overflowed: AtomicBool::new(false),
            zero_adjoint: ZeroAdjoint::default(),
        }
    }

    /// Create a tape from a validated configuration.
    ///
    /// Fails if the configured strategy is not the one `A` implements.
    pub fn with_config(config: &TapeConfig) -> Result<Self> {
        config.validate()?;
        if config.strategy != A::STRATEGY {
            return Err(TapeError::InvalidConfig(format!(
                "configured strategy {} does not match tape allocator {}",
                config.strategy,
                A::STRATEGY
            )));
        }
        let mut tape = Self::with_capacity(config.capacity);
        tape.zero_adjoint = config.zero_adjoint;
        Ok(tape)
    }

    // === Accessors ===

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of entries recorded in the current epoch.
    pub fn len(&self) -> usize {
        self.alloc.cursor() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The next id the allocator will hand out.
    ///
    /// Read this after registering independent variables to get the base to
    /// pass to [`Tape::reset`].
    pub fn next_id(&self) -> VarId {
        self.alloc.next_id()
    }

    pub fn strategy(&self) -> AllocationStrategy {
        A::STRATEGY
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Turn recording on or off. Takes `&mut self`, so it cannot race with lanes.
    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    pub fn zero_adjoint(&self) -> ZeroAdjoint {
        self.zero_adjoint
    }

    pub fn set_zero_adjoint(&mut self, zero_adjoint: ZeroAdjoint) {
        self.zero_adjoint = zero_adjoint;
    }

    /// Entries recorded by a device pass and not yet reconciled.
    pub fn merge_counter(&self) -> u32 {
        self.merge_counter
    }

    /// Whether an allocation was rejected during this epoch.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Relaxed)
    }

    /// Snapshot of the counters in device layout.
    pub fn header(&self) -> TapeHeader {
        TapeHeader::new(
            self.alloc.cursor(),
            self.alloc.next_id(),
            self.recording,
            self.merge_counter,
            self.capacity,
        )
    }

    /// Entries recorded in the current epoch, oldest first.
    pub fn entries(&mut self) -> &[Entry] {
        let len = self.len();
        &self.slots.as_slice()[..len]
    }

    /// Raw byte image of the recorded entries.
    pub fn entry_bytes(&mut self) -> &[u8] {
        bytemuck::cast_slice(self.entries())
    }

    // === Allocation ===

    /// Register an independent variable.
    ///
    /// Reserves an id without writing an entry. Ids are assigned whether or
    /// not the tape is recording so that parameters keep stable ids.
    pub fn variable(&self, value: f64) -> Value {
        Value::new(value, self.alloc.reserve_id())
    }

    /// Reserve the next cursor position and the next id.
    ///
    /// On `Tape<Atomic>` the two counters advance with separate atomic
    /// operations, so across concurrent lanes slot order and id order may
    /// differ. Within one lane both increase together, and the reverse pass
    /// only depends on slot order.
    pub fn allocate(&self) -> Result<Slot> {
        let index = self.allocate_slot()?;
        Ok(Slot {
            index,
            id: self.alloc.reserve_id(),
        })
    }

    /// Reserve the next cursor position only.
    pub fn allocate_slot(&self) -> Result<u32> {
        self.alloc.reserve_slot(self.capacity).ok_or_else(|| {
            self.mark_overflow();
            TapeError::CapacityExceeded {
                capacity: self.capacity,
            }
        })
    }

    fn write(&self, slot: u32, entry: Entry) {
        // SAFETY: `slot` came from this tape's allocator, which never returns
        // the same position twice within an epoch. `Tape<Sequential>` is
        // `!Sync`, and every read path borrows the tape mutably.
        unsafe { self.slots.write(slot as usize, entry) }
    }

    pub(crate) fn mark_overflow(&self) {
        if !self.overflowed.swap(true, Ordering::Relaxed) {
            log::error!(
                "tape capacity of {} entries exceeded; further operations are not recorded",
                self.capacity
            );
        }
    }

    // === Epoch management ===

    /// Rewind the tape for a new epoch.
    ///
    /// Clears the entries written in the previous epoch and restarts ids at
    /// `next_id_base` (raised to [`FIRST_ID`] if lower, since id 0 is the
    /// untracked sentinel).
    pub fn reset(&mut self, next_id_base: VarId) {
        let used = self.len();
        self.slots.clear(0..used);
        let base = next_id_base.max(FIRST_ID);
        self.alloc.rewind(0, base);
        self.merge_counter = 0;
        *self.overflowed.get_mut() = false;
        log::debug!("tape reset: cleared {used} entries, next id {base}");
    }

    /// Fold a downloaded device pass into the host counters.
    ///
    /// Adds the merge counter to both the cursor and the id counter, then
    /// sets it back to 0. A no-op when nothing is pending.
    pub fn reconcile(&mut self) {
        let merged = std::mem::take(&mut self.merge_counter);
        if merged == 0 {
            return;
        }
        let cursor = self.alloc.cursor() + merged;
        let next_id = self.alloc.next_id() + merged;
        debug_assert!(cursor <= self.capacity);
        self.alloc.rewind(cursor, next_id);
        log::debug!("reconciled {merged} device entries: cursor {cursor}, next id {next_id}");
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Entry] {
        self.slots.as_mut_slice()
    }

    pub(crate) fn set_merge_counter(&mut self, merge_counter: u32) {
        self.merge_counter = merge_counter;
    }

    // === Reverse pass ===

    /// Gradient of the last recorded entry with respect to every id.
    ///
    /// With recording disabled this is an all-zero vector.
    pub fn gradient(&mut self) -> Result<Gradient> {
        let n_ids = self.next_id() as usize;
        if !self.recording {
            log::debug!("gradient requested with recording disabled; returning zeros");
            return Ok(Gradient::zeros(n_ids));
        }
        self.check_ready()?;
        let zero_adjoint = self.zero_adjoint;
        let entries = self.entries();
        let seed = entries.last().map(Entry::id).ok_or(TapeError::EmptyTape)?;
        backward::reverse_sweep(entries, n_ids, seed, zero_adjoint)
    }

    /// Gradient of `output` instead of the last entry.
    ///
    /// If entries after `output` accumulate into its id, the gradient is that
    /// of the final accumulated value.
    pub fn gradient_of(&mut self, output: Value) -> Result<Gradient> {
        let n_ids = self.next_id() as usize;
        if !self.recording {
            return Ok(Gradient::zeros(n_ids));
        }
        if !output.is_tracked() || output.id() as usize >= n_ids {
            return Err(TapeError::UnknownOutput { id: output.id() });
        }
        self.check_ready()?;
        if self.is_empty() {
            return Err(TapeError::EmptyTape);
        }
        let zero_adjoint = self.zero_adjoint;
        backward::reverse_sweep(self.entries(), n_ids, output.id(), zero_adjoint)
    }

    fn check_ready(&self) -> Result<()> {
        if self.merge_counter != 0 {
            return Err(TapeError::PendingReconcile {
                merge_counter: self.merge_counter,
            });
        }
        if self.is_overflowed() {
            return Err(TapeError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

impl<A: SlotAllocator> Recorder for Tape<A> {
    fn is_recording(&self) -> bool {
        self.recording
    }

    fn push(&self, pairs: &[Pair]) -> VarId {
        match self.allocate() {
            Ok(slot) => {
                self.write(slot.index, Entry::new(slot.id, pairs));
                slot.id
            }
            Err(_) => UNTRACKED,
        }
    }

    fn push_into(&self, id: VarId, pairs: &[Pair]) {
        if let Ok(index) = self.allocate_slot() {
            self.write(index, Entry::new(id, pairs));
        }
    }
}
