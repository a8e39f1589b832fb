//! Reverse pass over a completed tape.
//!
//! The tape is already in chronological order, so a single backward sweep
//! over the entries visits every result after all of its consumers:
//! 1. Seed the adjoint of the output id with 1.0
//! 2. For each entry from last to first, read and zero the adjoint of its
//!    result id, then push `adjoint * dx` to each parent id
//!
//! Zeroing after the read is what makes repeated writes to one id work:
//! every accumulate entry hands the running adjoint back to the previous
//! value of the same id through its first pair.

use crate::config::ZeroAdjoint;
use crate::entry::{Entry, Value, VarId};
use crate::error::{Result, TapeError};

/// Dense adjoint vector indexed by tape id.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    adjoints: Vec<f64>,
}

impl Gradient {
    pub(crate) fn zeros(len: usize) -> Self {
        Gradient {
            adjoints: vec![0.0; len],
        }
    }

    /// Derivative of the output with respect to `value`.
    ///
    /// Untracked values and ids outside the vector have derivative 0.0.
    pub fn wrt(&self, value: Value) -> f64 {
        if !value.is_tracked() {
            return 0.0;
        }
        self.wrt_id(value.id()).unwrap_or(0.0)
    }

    /// Adjoint stored for `id`, if the id is inside the vector.
    pub fn wrt_id(&self, id: VarId) -> Option<f64> {
        self.adjoints.get(id as usize).copied()
    }

    /// Derivatives for several values, in order.
    pub fn wrt_many(&self, values: &[Value]) -> Vec<f64> {
        values.iter().map(|v| self.wrt(*v)).collect()
    }

    /// Number of ids covered (the tape's `next_id` when computed).
    pub fn len(&self) -> usize {
        self.adjoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjoints.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.adjoints
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.adjoints
    }
}

/// Run the backward sweep over `entries`, seeding `seed` with 1.0.
///
/// `n_ids` is the length of the adjoint vector. An entry that names an id at
/// or beyond it (a value kept across a reset to a lower base, or taken from
/// another tape) fails the sweep with [`TapeError::StaleId`].
pub fn reverse_sweep(
    entries: &[Entry],
    n_ids: usize,
    seed: VarId,
    zero_adjoint: ZeroAdjoint,
) -> Result<Gradient> {
    let stale = |id: VarId| TapeError::StaleId {
        id,
        next_id: n_ids as VarId,
    };
    let mut adjoints = vec![0.0; n_ids];
    *adjoints.get_mut(seed as usize).ok_or_else(|| stale(seed))? = 1.0;

    let mut skipped = 0usize;
    for entry in entries.iter().rev() {
        if let Some(pair) = entry.pairs().iter().find(|p| p.id as usize >= n_ids) {
            return Err(stale(pair.id));
        }
        let id = entry.id() as usize;
        let w = *adjoints.get(id).ok_or_else(|| stale(entry.id()))?;
        adjoints[id] = 0.0;

        if w == 0.0 && zero_adjoint == ZeroAdjoint::Skip {
            skipped += 1;
            continue;
        }

        for pair in entry.pairs() {
            adjoints[pair.id as usize] += w * pair.dx;
        }
    }

    log::trace!(
        "reverse sweep: {} entries, {} ids, {} skipped with zero adjoint",
        entries.len(),
        n_ids,
        skipped
    );

    Ok(Gradient { adjoints })
}
