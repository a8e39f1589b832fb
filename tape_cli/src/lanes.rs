//! How demo kernels reach the tape.
//!
//! A sequential tape is recorded through a device image; an atomic tape is
//! shared with the lanes directly. Kernels see both as `&dyn Recorder`.

use tape_core::{Atomic, Recorder, Sequential, Tape, TapeError};
use tape_lanes::{launch, record_shared, LaneBackend};

pub trait LaneTape: Recorder {
    /// Short label for output.
    fn path(&self) -> &'static str;

    fn record_lanes<B, T, F>(&mut self, backend: &B, lanes: usize, kernel: F) -> Result<Vec<T>, TapeError>
    where
        B: LaneBackend,
        T: Send,
        F: Fn(&dyn Recorder, usize) -> T + Sync + Send;
}

impl LaneTape for Tape<Sequential> {
    fn path(&self) -> &'static str {
        "device image"
    }

    fn record_lanes<B, T, F>(&mut self, backend: &B, lanes: usize, kernel: F) -> Result<Vec<T>, TapeError>
    where
        B: LaneBackend,
        T: Send,
        F: Fn(&dyn Recorder, usize) -> T + Sync + Send,
    {
        launch(self, backend, lanes, |dev, lane| kernel(dev, lane))
    }
}

impl LaneTape for Tape<Atomic> {
    fn path(&self) -> &'static str {
        "shared tape"
    }

    fn record_lanes<B, T, F>(&mut self, backend: &B, lanes: usize, kernel: F) -> Result<Vec<T>, TapeError>
    where
        B: LaneBackend,
        T: Send,
        F: Fn(&dyn Recorder, usize) -> T + Sync + Send,
    {
        Ok(record_shared(self, backend, lanes, |tape, lane| kernel(tape, lane)))
    }
}
