//! Bandwidth-sampling harness: the receiving side of the channel.
//!
//! The receiver infers the transmitted waveform from its own memory
//! bandwidth, so it simply streams one `type,bandwidth,time` CSV row per
//! burst to stdout and a bandwidth summary to stderr. Redirecting stdout
//! captures clean CSV.

use crate::commands::{resolve_parallelism, ReceiveArgs};
use crate::error::{CliError, CliResult};
use crate::statistics::{render_bandwidth_summary, SampleSummary};
use chrono::Utc;
use susurro::{ContentionGenerator, ContentionMode};
use tracing::debug;

/// Run the receive harness
pub fn run(args: &ReceiveArgs) -> CliResult<()> {
    let mode: ContentionMode = args.mode.parse()?;
    if args.iterations == 0 {
        return Err(CliError::usage("iterations must be positive"));
    }

    let parallelism = resolve_parallelism(args.parallelism)?;
    let mut generator = ContentionGenerator::new(parallelism, args.buffer_size)?;
    debug!(
        %mode,
        parallelism,
        buffer_size = args.buffer_size,
        kernel = %generator.kernel(),
        "receive harness ready"
    );

    println!("type,bandwidth,time");

    for _ in 0..args.warmup {
        let time = sample_time_ns();
        let measurement = generator.burst(mode)?;
        println!("warmup,{},{}", measurement.bytes_per_ns, time);
    }

    let mut bandwidths = Vec::with_capacity(args.iterations);
    for _ in 0..args.iterations {
        let time = sample_time_ns();
        let measurement = generator.burst(mode)?;
        bandwidths.push(measurement.bytes_per_ns);
        println!("{},{},{}", mode.as_str(), measurement.bytes_per_ns, time);
    }

    if let Some(summary) = SampleSummary::from_samples(&bandwidths) {
        eprint!("{}", render_bandwidth_summary(&summary));
    }
    Ok(())
}

/// Nanoseconds since the Unix epoch, the CSV `time` column
fn sample_time_ns() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn args(mode: &str, iterations: usize) -> ReceiveArgs {
        ReceiveArgs {
            mode: mode.to_string(),
            parallelism: 1,
            warmup: 0,
            iterations,
            buffer_size: 4096,
        }
    }

    #[test]
    fn rejects_unknown_mode_text() {
        let err = run(&args("sideways", 1)).unwrap_err();
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn rejects_zero_iterations() {
        let err = run(&args("read", 0)).unwrap_err();
        assert!(matches!(err, CliError::Usage { .. }));
        assert!(err.to_string().contains("iterations"));
    }

    #[test]
    fn sample_time_is_recent() {
        // Any plausible wall clock is far past the epoch.
        assert!(sample_time_ns() > 1_000_000_000);
    }
}
