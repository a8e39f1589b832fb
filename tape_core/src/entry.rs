//! Plain-old-data records shared between the host tape and device images.
//!
//! Every type here is `#[repr(C)]` with its padding spelled out, so the byte
//! image of a buffer of entries is the same on both sides of a transfer.

use bytemuck::{Pod, Zeroable};

/// Maximum number of operands a single tape entry can reference.
pub const MAX_OPERANDS: usize = 2;

/// Identifier of a value on the tape.
pub type VarId = u32;

/// Reserved id for values the tape does not track.
pub const UNTRACKED: VarId = 0;

/// First id handed out by an allocator.
pub const FIRST_ID: VarId = 1;

/// A forward-computed scalar and the tape id naming it.
///
/// Values are `Copy` and carry no reference to the tape that produced them.
/// An id of [`UNTRACKED`] means the value behaves as a constant during
/// differentiation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Value {
    value: f64,
    id: VarId,
    _pad: u32,
}

impl Value {
    /// Create an untracked value.
    pub fn constant(value: f64) -> Self {
        Value::new(value, UNTRACKED)
    }

    pub(crate) fn new(value: f64, id: VarId) -> Self {
        Value { value, id, _pad: 0 }
    }

    /// The forward value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// The tape id, or [`UNTRACKED`].
    pub fn id(&self) -> VarId {
        self.id
    }

    /// Whether this value has an id on the tape.
    pub fn is_tracked(&self) -> bool {
        self.id != UNTRACKED
    }

    /// The same tape id carrying a new forward value.
    ///
    /// Meant for updating independent variables between epochs, after a
    /// [`Tape::reset`](crate::Tape::reset) that kept their ids.
    pub fn with_value(self, value: f64) -> Self {
        Value::new(value, self.id)
    }

    pub(crate) fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub(crate) fn set_id(&mut self, id: VarId) {
        self.id = id;
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::constant(value)
    }
}

/// An operand reference: parent id and the local partial with respect to it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Pair {
    /// Local partial derivative d(result)/d(parent).
    pub dx: f64,
    /// Id of the parent value.
    pub id: VarId,
    _pad: u32,
}

impl Pair {
    pub fn new(dx: f64, id: VarId) -> Self {
        Pair { dx, id, _pad: 0 }
    }
}

/// One tape record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Entry {
    coeff: [Pair; MAX_OPERANDS],
    id: VarId,
    size: u32,
}

impl Entry {
    /// Build an entry from up to [`MAX_OPERANDS`] pairs.
    ///
    /// # Panics
    /// If more than `MAX_OPERANDS` pairs are given.
    pub fn new(id: VarId, pairs: &[Pair]) -> Self {
        assert!(
            pairs.len() <= MAX_OPERANDS,
            "entry holds at most {MAX_OPERANDS} pairs, got {}",
            pairs.len()
        );
        let mut coeff = [Pair::zeroed(); MAX_OPERANDS];
        coeff[..pairs.len()].copy_from_slice(pairs);
        Entry {
            coeff,
            id,
            size: pairs.len() as u32,
        }
    }

    /// Id of the value this entry produces (or accumulates into).
    pub fn id(&self) -> VarId {
        self.id
    }

    /// Number of valid pairs.
    pub fn size(&self) -> usize {
        self.size as usize
    }

    /// The valid pairs.
    pub fn pairs(&self) -> &[Pair] {
        // A zeroed or corrupt size must not index past the array.
        &self.coeff[..self.size().min(MAX_OPERANDS)]
    }

    /// Whether this slot holds no record.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Counters of a tape, in the layout exchanged with a device.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TapeHeader {
    pub stack_cursor: u32,
    pub next_id: u32,
    pub recording: u32,
    pub merge_counter: u32,
    pub capacity: u32,
    _pad: u32,
}

impl TapeHeader {
    pub(crate) fn new(
        stack_cursor: u32,
        next_id: u32,
        recording: bool,
        merge_counter: u32,
        capacity: u32,
    ) -> Self {
        TapeHeader {
            stack_cursor,
            next_id,
            recording: recording as u32,
            merge_counter,
            capacity,
            _pad: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording != 0
    }
}
