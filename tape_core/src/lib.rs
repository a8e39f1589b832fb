//! # tape_core - Linear-tape Reverse-mode Automatic Differentiation
//!
//! This crate records scalar computations onto a preallocated, append-only
//! tape and computes gradients with a single backward sweep. The same
//! recorders run against a host [`Tape`] or against a [`DeviceTape`] image
//! that many parallel lanes write into at once.
//!
//! ## Overview
//!
//! Each elementary operation computes its forward value, then pushes one
//! [`Entry`] holding the local partial derivative with respect to each
//! operand. Because the tape is written in execution order, walking it
//! backwards visits every value after all of its consumers, so one pass over
//! the entries produces the full gradient.
//!
//! ## Quick Start
//!
//! ```
//! use tape_core::{ops, Tape};
//!
//! let mut tape = Tape::new(1024);
//!
//! // Register the inputs we differentiate with respect to
//! let a = tape.variable(2.0);
//! let b = tape.variable(3.0);
//!
//! // c = a * 5 + b
//! let c = ops::add(&tape, ops::mul(&tape, a, 5.0), b);
//! assert_eq!(c.value(), 13.0);
//!
//! // Reverse pass from the last recorded entry
//! let grads = tape.gradient().unwrap();
//! assert_eq!(grads.wrt(a), 5.0);
//! assert_eq!(grads.wrt(b), 1.0);
//! ```
//!
//! ## Supported Operations
//!
//! | Category | Operations |
//! |----------|------------|
//! | Arithmetic | [`ops::add`], [`ops::sub`], [`ops::mul`], [`ops::div`], [`ops::neg`], [`ops::square`] |
//! | Power | [`ops::pow`] (either operand may be tracked) |
//! | Trigonometric | `sin`, `cos`, `tan`, `asin`, `acos`, `atan` |
//! | Hyperbolic | `sinh`, `cosh`, `tanh` |
//! | Exponential | [`ops::exp`], [`ops::log`], [`ops::log10`], [`ops::sqrt`] |
//! | In place | [`ops::accumulate`] (`+=` keeping the target's id) |
//!
//! ## Architecture
//!
//! - **[`Tape`]**: entry arena plus cursor, id counter and recording flag.
//!   The allocator type parameter ([`Sequential`] or [`Atomic`]) decides
//!   whether lanes may share it.
//! - **[`Recorder`]**: the seam the [`ops`] functions write through.
//! - **[`DeviceTape`]**: raw-memory image for parallel lanes, merged back
//!   with [`DeviceTape::download`] and [`Tape::reconcile`].
//! - **[`Gradient`]**: dense adjoint vector indexed by id.
//! - **[`Var`]**: operator-overloading wrapper.
//! - **[`finite_diff_grad`]**: numerical reference for checking gradients.
//!
//! ## Example: Epochs
//!
//! ```
//! use tape_core::{ops, Tape};
//!
//! let mut tape = Tape::new(1024);
//! let w = tape.variable(0.5);
//! let base = tape.next_id();
//!
//! for _ in 0..3 {
//!     // loss = (2w - 3)^2, dloss/dw = 4(2w - 3)
//!     let r = ops::sub(&tape, ops::mul(&tape, w, 2.0), 3.0);
//!     ops::square(&tape, r);
//!     let g = tape.gradient().unwrap();
//!     assert_eq!(g.wrt(w), -8.0);
//!
//!     // Same ids for the parameters next time around
//!     tape.reset(base);
//! }
//! ```

mod alloc;
mod backward;
mod config;
mod device;
mod entry;
mod error;
mod finite_diff;
pub mod ops;
mod recorder;
mod slots;
mod tape;
mod var;

pub use alloc::{AllocationStrategy, Atomic, Sequential, Slot, SlotAllocator};
pub use backward::{reverse_sweep, Gradient};
pub use config::{TapeConfig, ZeroAdjoint, DEFAULT_CAPACITY};
pub use device::DeviceTape;
pub use entry::{Entry, Pair, TapeHeader, Value, VarId, FIRST_ID, MAX_OPERANDS, UNTRACKED};
pub use error::{Result, TapeError};
pub use finite_diff::{finite_diff_grad, max_relative_error};
pub use ops::Operand;
pub use recorder::Recorder;
pub use tape::Tape;
pub use var::Var;
