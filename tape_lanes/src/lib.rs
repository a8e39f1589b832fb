//! Lane executors for tape_core.
//!
//! A lane is one independent invocation of a recording kernel, identified by
//! its index. Lanes record either into a [`DeviceTape`] image that is merged
//! back into the host tape afterwards ([`launch`]), or straight into a shared
//! `Tape<Atomic>` ([`record_shared`]). The executor decides how lanes are
//! scheduled: [`SerialLanes`] runs them one after another on the calling
//! thread, [`ThreadLanes`] spreads them over a rayon thread pool.

use rayon::prelude::*;
use tape_core::{Atomic, DeviceTape, SlotAllocator, Tape, TapeError};

/// Runs a kernel once per lane index and collects the results in lane order.
pub trait LaneBackend: Send + Sync {
    /// Short name for logs and CLI output.
    fn name(&self) -> &'static str;

    /// Number of lanes that can make progress at the same time.
    fn parallelism(&self) -> usize;

    /// Run `kernel(0)`, ..., `kernel(lanes - 1)` and return the outputs in
    /// lane order.
    fn run<T, F>(&self, lanes: usize, kernel: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;
}

/// All lanes on the calling thread, in index order.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialLanes;

impl LaneBackend for SerialLanes {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn parallelism(&self) -> usize {
        1
    }

    fn run<T, F>(&self, lanes: usize, kernel: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        (0..lanes).map(kernel).collect()
    }
}

/// Lanes scheduled on a dedicated rayon thread pool.
#[derive(Debug)]
pub struct ThreadLanes {
    pool: rayon::ThreadPool,
}

impl ThreadLanes {
    /// Build a pool with `threads` workers; 0 lets rayon pick one per core.
    pub fn new(threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tape-lane-{i}"))
            .build()?;
        log::debug!("lane pool ready with {} threads", pool.current_num_threads());
        Ok(ThreadLanes { pool })
    }
}

impl LaneBackend for ThreadLanes {
    fn name(&self) -> &'static str {
        "threads"
    }

    fn parallelism(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn run<T, F>(&self, lanes: usize, kernel: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        self.pool
            .install(|| (0..lanes).into_par_iter().map(kernel).collect())
    }
}

/// Record `lanes` kernel invocations through a device image of `tape`.
///
/// Uploads the tape, runs every lane against the shared [`DeviceTape`],
/// downloads the written entries and reconciles, so on return the tape is
/// ready for more host recording or a reverse pass. Works for either
/// allocation strategy, since only the image is shared between lanes.
pub fn launch<A, B, T, F>(
    tape: &mut Tape<A>,
    backend: &B,
    lanes: usize,
    kernel: F,
) -> Result<Vec<T>, TapeError>
where
    A: SlotAllocator,
    B: LaneBackend,
    T: Send,
    F: Fn(&DeviceTape, usize) -> T + Sync + Send,
{
    let device = DeviceTape::upload(tape)?;
    let outputs = backend.run(lanes, |lane| kernel(&device, lane));
    let recorded = device.download(tape)?;
    tape.reconcile();
    log::debug!(
        "{} lanes on {} backend recorded {} entries",
        lanes,
        backend.name(),
        recorded
    );
    Ok(outputs)
}

/// Run `lanes` kernel invocations that record directly into a shared tape.
///
/// Only `Tape<Atomic>` can be shared this way; slot and id reservations are
/// lock-free and each lane writes its own slots.
pub fn record_shared<B, T, F>(tape: &Tape<Atomic>, backend: &B, lanes: usize, kernel: F) -> Vec<T>
where
    B: LaneBackend,
    T: Send,
    F: Fn(&Tape<Atomic>, usize) -> T + Sync + Send,
{
    let before = tape.len();
    let outputs = backend.run(lanes, |lane| kernel(tape, lane));
    log::debug!(
        "{} lanes on {} backend recorded {} shared entries",
        lanes,
        backend.name(),
        tape.len() - before
    );
    outputs
}
