//! Susurrador CLI library
//!
//! Command-line harnesses over the `susurro` contention library: a
//! bandwidth-sampling receiver, a contention-modulating transmitter and
//! a timing-consistency benchmark. Each harness streams one CSV sample
//! row per line to stdout and keeps diagnostics and summaries on
//! stderr, so runs pipe straight into analysis scripts.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod commands;
mod error;
pub mod receiver;
pub mod statistics;
pub mod timing;
pub mod transmitter;

pub use commands::{
    resolve_parallelism, Cli, Commands, ReceiveArgs, TimingArgs, TimingPrimitive, TransmitArgs,
};
pub use error::{CliError, CliResult};
pub use statistics::{render_bandwidth_summary, render_error_summary, SampleSummary};
pub use transmitter::encode_bits;
