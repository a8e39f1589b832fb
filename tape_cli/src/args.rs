//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tape_core::{AllocationStrategy, ZeroAdjoint};

/// Demo driver for the linear-tape autodiff engine
#[derive(Parser, Debug, Clone)]
#[command(name = "tape")]
#[command(version)]
#[command(about = "Record lane-parallel computations on a linear tape and differentiate them")]
pub struct Cli {
    /// Demo to run
    #[command(subcommand)]
    pub command: Command,

    /// JSON file with a tape configuration; flags override its values
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Entries preallocated on the tape
    #[arg(long, global = true)]
    pub capacity: Option<u32>,

    /// Slot allocation strategy
    #[arg(long, global = true, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Zero-adjoint handling in the reverse pass
    #[arg(long, global = true, value_enum)]
    pub zero_adjoint: Option<ZeroAdjointArg>,

    /// Lane executor
    #[arg(short, long, global = true, value_enum, default_value_t = BackendArg::Threads)]
    pub backend: BackendArg,

    /// Worker threads for the threads backend (0 = one per core)
    #[arg(short, long, global = true, default_value_t = 0)]
    pub threads: usize,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fit a line: log of the summed squared residuals, one lane per point
    Regression(RegressionArgs),

    /// Matrix product through accumulation, one lane per output element
    Matmul(MatmulArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct RegressionArgs {
    /// Number of data points (and lanes)
    #[arg(short = 'n', long, default_value_t = 1000)]
    pub points: usize,

    /// Recording epochs; odd epochs run with recording disabled
    #[arg(short, long, default_value_t = 4)]
    pub epochs: usize,

    /// Slope used to generate the data
    #[arg(long, default_value_t = 4.1919)]
    pub slope: f64,

    /// Intercept used to generate the data
    #[arg(long, default_value_t = 3.2123)]
    pub intercept: f64,
}

#[derive(Parser, Debug, Clone)]
pub struct MatmulArgs {
    /// Side length of the square matrices
    #[arg(short = 'n', long, default_value_t = 32)]
    pub size: usize,

    /// Number of timed epochs
    #[arg(short, long, default_value_t = 3)]
    pub epochs: usize,

    /// Seed for the random matrix entries
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    Serial,
    Threads,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyArg {
    Sequential,
    Atomic,
}

impl From<StrategyArg> for AllocationStrategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Sequential => AllocationStrategy::Sequential,
            StrategyArg::Atomic => AllocationStrategy::Atomic,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroAdjointArg {
    Skip,
    Propagate,
}

impl From<ZeroAdjointArg> for ZeroAdjoint {
    fn from(z: ZeroAdjointArg) -> Self {
        match z {
            ZeroAdjointArg::Skip => ZeroAdjoint::Skip,
            ZeroAdjointArg::Propagate => ZeroAdjoint::Propagate,
        }
    }
}
