//! CLI demo for the linear-tape autodiff engine.
//!
//! Records lane-parallel computations, merges them into a host tape, runs the
//! reverse pass and validates the gradients against finite differences.
//!
//! ```bash
//! tape regression -n 10000 --backend threads
//! tape --strategy atomic matmul -n 64 --epochs 5
//! RUST_LOG=debug tape --config tape.json regression
//! ```

mod args;
mod demos;
mod lanes;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tape_core::{AllocationStrategy, Atomic, Sequential, SlotAllocator, Tape, TapeConfig};
use tape_lanes::{LaneBackend, SerialLanes, ThreadLanes};

use args::{BackendArg, Cli, Command};
use lanes::LaneTape;

/// Capacity used when neither a config file nor a flag sets one.
const DEMO_CAPACITY: u32 = 1_000_000;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    log::info!(
        "tape: capacity {}, {} allocation, zero adjoint {:?}",
        config.capacity,
        config.strategy,
        config.zero_adjoint
    );

    match cli.backend {
        BackendArg::Serial => with_backend(&SerialLanes, &config, &cli.command),
        BackendArg::Threads => {
            let lanes = ThreadLanes::new(cli.threads).context("building the lane thread pool")?;
            with_backend(&lanes, &config, &cli.command)
        }
    }
}

/// Config file first, then command-line overrides.
fn resolve_config(cli: &Cli) -> Result<TapeConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TapeConfig::with_capacity(DEMO_CAPACITY),
    };
    if let Some(capacity) = cli.capacity {
        config.capacity = capacity;
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy.into();
    }
    if let Some(zero_adjoint) = cli.zero_adjoint {
        config.zero_adjoint = zero_adjoint.into();
    }
    config.validate()?;
    Ok(config)
}

fn load_config(path: &Path) -> Result<TapeConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
}

fn with_backend<B: LaneBackend>(backend: &B, config: &TapeConfig, command: &Command) -> Result<()> {
    match config.strategy {
        AllocationStrategy::Sequential => {
            let mut tape = Tape::<Sequential>::with_config(config)?;
            run(&mut tape, backend, command)
        }
        AllocationStrategy::Atomic => {
            let mut tape = Tape::<Atomic>::with_config(config)?;
            run(&mut tape, backend, command)
        }
    }
}

fn run<A, B>(tape: &mut Tape<A>, backend: &B, command: &Command) -> Result<()>
where
    A: SlotAllocator,
    Tape<A>: LaneTape,
    B: LaneBackend,
{
    match command {
        Command::Regression(args) => demos::regression(tape, backend, args),
        Command::Matmul(args) => demos::matmul(tape, backend, args),
    }
}
