//! Tape configuration.

use serde::{Deserialize, Serialize};

use crate::alloc::AllocationStrategy;
use crate::error::{Result, TapeError};

/// Default number of entries preallocated per tape.
pub const DEFAULT_CAPACITY: u32 = 10_000_000;

/// What the reverse pass does with an entry whose adjoint is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroAdjoint {
    /// Zero the cell and skip the pair loop.
    #[default]
    Skip,
    /// Zero the cell and propagate anyway.
    Propagate,
}

/// Construction parameters for a [`Tape`](crate::Tape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapeConfig {
    /// Number of entries preallocated; never grows.
    pub capacity: u32,
    /// Allocation strategy the tape must be built with.
    pub strategy: AllocationStrategy,
    /// Zero-adjoint handling in the reverse pass.
    pub zero_adjoint: ZeroAdjoint,
}

impl Default for TapeConfig {
    fn default() -> Self {
        TapeConfig {
            capacity: DEFAULT_CAPACITY,
            strategy: AllocationStrategy::default(),
            zero_adjoint: ZeroAdjoint::default(),
        }
    }
}

impl TapeConfig {
    pub fn with_capacity(capacity: u32) -> Self {
        TapeConfig {
            capacity,
            ..Default::default()
        }
    }

    pub fn strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn zero_adjoint(mut self, zero_adjoint: ZeroAdjoint) -> Self {
        self.zero_adjoint = zero_adjoint;
        self
    }

    /// Check the configuration before any memory is reserved.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(TapeError::InvalidConfig(
                "capacity must be at least one entry".to_string(),
            ));
        }
        Ok(())
    }
}
