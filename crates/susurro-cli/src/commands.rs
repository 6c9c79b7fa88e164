//! CLI command definitions using clap

use crate::error::CliResult;
use clap::{Parser, Subcommand, ValueEnum};

/// Susurrador: experiment harnesses for the Susurro contention channel
#[derive(Parser, Debug)]
#[command(name = "susurrador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sample this process's own memory bandwidth, one CSV row per burst
    Receive(ReceiveArgs),

    /// Modulate memory contention to transmit a message bit by bit
    Transmit(TransmitArgs),

    /// Benchmark the scheduling error of the timing primitives
    Timing(TimingArgs),
}

/// Arguments for the receive command
#[derive(Parser, Debug)]
pub struct ReceiveArgs {
    /// Contention mode (READ, WRITE, or COPY)
    #[arg(short, long, default_value = "READ")]
    pub mode: String,

    /// Number of lanes (0 for one per available core)
    #[arg(short, long, default_value_t = 0)]
    pub parallelism: usize,

    /// Discarded warmup bursts before measurement
    #[arg(short, long, default_value_t = 32)]
    pub warmup: usize,

    /// Measured bursts
    #[arg(short, long, default_value_t = 64)]
    pub iterations: usize,

    /// Per-lane buffer size in bytes
    #[arg(short, long, default_value_t = 67_108_864, env = "SUSURRO_BUFFER_SIZE")]
    pub buffer_size: usize,
}

/// Arguments for the transmit command
#[derive(Parser, Debug)]
pub struct TransmitArgs {
    /// Contention mode (READ, WRITE, or COPY)
    #[arg(short, long, default_value = "READ")]
    pub mode: String,

    /// Number of lanes (0 for one per available core)
    #[arg(short, long, default_value_t = 0)]
    pub parallelism: usize,

    /// Warmup bursts before the first bit
    #[arg(short, long, default_value_t = 32)]
    pub warmup: usize,

    /// Per-lane buffer size in bytes
    #[arg(short, long, default_value_t = 67_108_864, env = "SUSURRO_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Message to transmit
    #[arg(long)]
    pub message: String,

    /// Bit interval in milliseconds
    #[arg(long, default_value_t = 100.0)]
    pub switch_time_ms: f64,

    /// Fraction of a high bit's interval spent quiet instead of bursting
    #[arg(long, default_value_t = 0.0)]
    pub sleep_fraction: f64,
}

/// Arguments for the timing command
#[derive(Parser, Debug)]
pub struct TimingArgs {
    /// Timing primitive to benchmark
    #[arg(long, value_enum)]
    pub primitive: TimingPrimitive,

    /// Measured iterations
    #[arg(short, long, default_value_t = 32)]
    pub iterations: usize,

    /// Target duration per iteration in nanoseconds
    #[arg(short, long, default_value_t = 1_000_000_000)]
    pub duration_ns: u64,

    /// Contention mode (READ, WRITE, or COPY); run-for/run-until only
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Number of lanes (0 for one per available core); run-for/run-until only
    #[arg(short, long)]
    pub parallelism: Option<usize>,

    /// Per-lane buffer size in bytes; run-for/run-until only
    #[arg(short, long)]
    pub buffer_size: Option<usize>,
}

/// Timing primitive selector
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimingPrimitive {
    /// Adaptive contention run of a fixed duration
    RunFor,
    /// Adaptive contention run to an absolute deadline
    RunUntil,
    /// Hybrid precise sleep of a fixed duration
    SleepFor,
    /// Hybrid precise sleep to an absolute deadline
    SleepUntil,
}

impl TimingPrimitive {
    /// Whether this primitive drives a contention generator
    #[must_use]
    pub fn needs_generator(self) -> bool {
        matches!(self, Self::RunFor | Self::RunUntil)
    }
}

/// Resolve a `--parallelism` argument: 0 means one lane per available core
pub fn resolve_parallelism(requested: usize) -> CliResult<usize> {
    if requested != 0 {
        return Ok(requested);
    }
    Ok(std::thread::available_parallelism()?.get())
}
