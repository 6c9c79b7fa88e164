//! Timing-consistency harness over the four timing primitives.
//!
//! Streams one `iteration,error` CSV row per sample to stdout and the
//! signed-error summary to stderr. The run-* primitives drive a
//! contention generator and need the generator flags; the sleep-*
//! primitives take none and reject them.

use crate::commands::{resolve_parallelism, TimingArgs, TimingPrimitive};
use crate::error::{CliError, CliResult};
use crate::statistics::{render_error_summary, SampleSummary};
use std::time::{Duration, Instant};
use susurro::{sleep_for, sleep_until, ContentionGenerator, ContentionMode};

/// Run the timing harness
pub fn run(args: &TimingArgs) -> CliResult<()> {
    if args.iterations == 0 {
        return Err(CliError::usage("iterations must be positive"));
    }
    if args.duration_ns == 0 {
        return Err(CliError::usage("duration must be positive"));
    }
    let duration = Duration::from_nanos(args.duration_ns);

    let mut errors = Vec::with_capacity(args.iterations);
    if args.primitive.needs_generator() {
        let (mut generator, mode) = build_generator(args)?;
        let until = args.primitive == TimingPrimitive::RunUntil;
        println!("iteration,error");
        for iteration in 0..args.iterations {
            let error_ns = if until {
                generator
                    .run_until(mode, Instant::now() + duration)?
                    .error_ns
            } else {
                generator.run_for(mode, duration)?.error_ns
            };
            println!("{iteration},{error_ns}");
            errors.push(error_ns as f64);
        }
    } else {
        reject_generator_flags(args)?;
        let until = args.primitive == TimingPrimitive::SleepUntil;
        println!("iteration,error");
        for iteration in 0..args.iterations {
            let error_ns = if until {
                sleep_until(Instant::now() + duration)?
            } else {
                sleep_for(duration)?
            };
            println!("{iteration},{error_ns}");
            errors.push(error_ns as f64);
        }
    }

    if let Some(summary) = SampleSummary::from_samples(&errors) {
        eprint!("{}", render_error_summary(&summary));
    }
    Ok(())
}

/// Build the generator the run-* primitives drive
fn build_generator(args: &TimingArgs) -> CliResult<(ContentionGenerator, ContentionMode)> {
    let (Some(mode_text), Some(parallelism), Some(buffer_size)) =
        (args.mode.as_deref(), args.parallelism, args.buffer_size)
    else {
        return Err(CliError::usage(
            "--mode, --parallelism and --buffer-size are required for the run-for and run-until primitives",
        ));
    };
    let mode: ContentionMode = mode_text.parse()?;
    let parallelism = resolve_parallelism(parallelism)?;
    let generator = ContentionGenerator::new(parallelism, buffer_size)?;
    Ok((generator, mode))
}

/// Reject generator flags on the sleep-* primitives
fn reject_generator_flags(args: &TimingArgs) -> CliResult<()> {
    if args.mode.is_some() || args.parallelism.is_some() || args.buffer_size.is_some() {
        return Err(CliError::usage(
            "--mode, --parallelism and --buffer-size only apply to the run-for and run-until primitives",
        ));
    }
    Ok(())
}
