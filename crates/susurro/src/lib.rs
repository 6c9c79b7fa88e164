//! Susurro: memory-contention covert-channel testbed
//!
//! Susurro (Spanish: "whisper") generates controlled, measurable
//! contention on the memory subsystem and pairs it with a precise hybrid
//! sleep, the two primitives a contention covert channel is built from.
//! A transmitter modulates memory-bus pressure over time; a receiver
//! recovers the signal by sampling its own achievable bandwidth.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                    ContentionGenerator                        │
//! │  ┌────────┐  ┌────────┐  ┌────────┐   persistent lanes:       │
//! │  │ lane 0 │  │ lane 1 │  │ lane N │   thread + private        │
//! │  │ rd/wr  │  │ rd/wr  │  │ rd/wr  │   read/write buffer pair  │
//! │  └───┬────┘  └───┬────┘  └───┬────┘                           │
//! │      └───────────┼───────────┘                                │
//! │           streaming kernel (AVX2 / NEON / scalar)             │
//! │           burst → run_for / run_until (adaptive sizing)       │
//! └───────────────────────────────────────────────────────────────┘
//! ┌───────────────────────────────────────────────────────────────┐
//! │   sleep_for / sleep_until: coarse OS block + fine clock spin  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use susurro::{ContentionGenerator, ContentionMode};
//! use std::time::Duration;
//!
//! # fn main() -> susurro::SusurroResult<()> {
//! // Four lanes, each owning a private 1 MiB read/write buffer pair.
//! let mut generator = ContentionGenerator::new(4, 1 << 20)?;
//!
//! // One full-buffer burst; bandwidth is summed across lanes.
//! let burst = generator.burst(ContentionMode::Read)?;
//! assert!(burst.bytes_per_ns > 0.0);
//!
//! // Saturate the bus for ~5 ms and report the signed timing error.
//! let run = generator.run_for(ContentionMode::Copy, Duration::from_millis(5))?;
//! assert!(run.bytes_per_ns.is_finite());
//!
//! // Precise sleep: block coarsely, spin the tail.
//! let error_ns = susurro::sleep_for(Duration::from_millis(2))?;
//! assert!(error_ns.abs() < 2_000_000);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod buffer;
mod config;
mod generator;
mod kernel;
mod mode;
mod result;
mod sleep;

pub use config::{GeneratorTuning, SleepTuning, MIN_TARGET_DURATION};
pub use generator::{BurstMeasurement, ContentionGenerator, RunMeasurement};
pub use kernel::KernelKind;
pub use mode::ContentionMode;
pub use result::{SusurroError, SusurroResult};
pub use sleep::{sleep_for, sleep_for_with_tuning, sleep_until, sleep_until_with_tuning};
