//! The handle every primitive recorder writes through.

use crate::entry::{Pair, VarId};

/// Something the primitive recorders in [`ops`](crate::ops) can write to.
///
/// Implemented by the host [`Tape`](crate::Tape) and by
/// [`DeviceTape`](crate::DeviceTape). Methods take `&self`; implementations
/// shared between lanes must hand out disjoint slots.
pub trait Recorder {
    /// Whether entries are being recorded. Constant for the whole epoch.
    fn is_recording(&self) -> bool;

    /// Write an entry for a freshly allocated id and return that id.
    ///
    /// Returns [`UNTRACKED`](crate::UNTRACKED) when the allocation is
    /// rejected; the recorder is then marked overflowed.
    fn push(&self, pairs: &[Pair]) -> VarId;

    /// Write an entry whose result is the existing `id`.
    ///
    /// A rejected allocation writes nothing and marks the recorder
    /// overflowed, like [`Recorder::push`].
    fn push_into(&self, id: VarId, pairs: &[Pair]);
}

impl<R: Recorder + ?Sized> Recorder for &R {
    fn is_recording(&self) -> bool {
        (**self).is_recording()
    }

    fn push(&self, pairs: &[Pair]) -> VarId {
        (**self).push(pairs)
    }

    fn push_into(&self, id: VarId, pairs: &[Pair]) {
        (**self).push_into(id, pairs)
    }
}
