//! Contention-modulating harness: the transmitting side of the channel.
//!
//! Encodes the message MSB-first per byte and shapes one bit per
//! `switch_time` interval: a high bit saturates the bus for
//! `switch_time × (1 − sleep_fraction)` and then goes quiet for the
//! remainder, a low bit stays quiet for the whole interval. After each
//! interval the bit is logged as a `High`/`Low` line with the wall-clock
//! time, so a receiver trace can be aligned offline.

use crate::commands::{resolve_parallelism, TransmitArgs};
use crate::error::{CliError, CliResult};
use chrono::Local;
use std::time::{Duration, Instant};
use susurro::{sleep_for, ContentionGenerator, ContentionMode, SleepTuning};
use tracing::debug;

/// Run the transmit harness
pub fn run(args: &TransmitArgs) -> CliResult<()> {
    let mode: ContentionMode = args.mode.parse()?;
    if args.message.is_empty() {
        return Err(CliError::usage("message must not be empty"));
    }
    if !args.switch_time_ms.is_finite() || args.switch_time_ms <= 0.0 {
        return Err(CliError::usage(format!(
            "switch time must be a positive number of milliseconds, got {}",
            args.switch_time_ms
        )));
    }
    if !args.sleep_fraction.is_finite() || !(0.0..1.0).contains(&args.sleep_fraction) {
        return Err(CliError::usage(format!(
            "sleep fraction must be in [0, 1), got {}",
            args.sleep_fraction
        )));
    }

    let min_sleep = SleepTuning::default().min_sleep_duration;
    let switch_time = Duration::try_from_secs_f64(args.switch_time_ms / 1e3).map_err(|_| {
        CliError::usage(format!(
            "switch time {} ms is out of range",
            args.switch_time_ms
        ))
    })?;
    if switch_time < min_sleep {
        return Err(CliError::usage(format!(
            "switch time {switch_time:?} is below the {min_sleep:?} sleep floor"
        )));
    }
    let run_share = switch_time.mul_f64(1.0 - args.sleep_fraction);
    let sleep_share = switch_time.mul_f64(args.sleep_fraction);

    let bits = encode_bits(&args.message);
    let parallelism = resolve_parallelism(args.parallelism)?;
    let mut generator = ContentionGenerator::new(parallelism, args.buffer_size)?;

    // Settle the kernel and take the channel's baseline bandwidth.
    if args.warmup > 0 {
        let mut baseline = 0.0;
        for _ in 0..args.warmup {
            baseline += generator.burst(mode)?.bytes_per_ns;
        }
        baseline /= args.warmup as f64;
        debug!(baseline_bytes_per_ns = baseline, "warmup complete");
    }

    let transmit_start = Instant::now();
    for &high in &bits {
        if high {
            let deadline = Instant::now() + run_share;
            // At least one burst per high bit, even when the run share
            // has already elapsed.
            loop {
                generator.burst(mode)?;
                if Instant::now() >= deadline {
                    break;
                }
            }
            // A share below the sleep floor is skipped rather than
            // rejected; against a millisecond interval it is noise.
            if sleep_share >= min_sleep {
                sleep_for(sleep_share)?;
            }
        } else {
            sleep_for(switch_time)?;
        }
        println!(
            "{} {}",
            if high { "High" } else { "Low" },
            wall_clock_stamp()
        );
    }
    let total = transmit_start.elapsed();

    eprintln!(
        "Transmitted {} bits in {:.3} s",
        bits.len(),
        total.as_secs_f64()
    );
    Ok(())
}

/// Message bits, most significant bit of each byte first
#[must_use]
pub fn encode_bits(message: &str) -> Vec<bool> {
    let mut bits = Vec::with_capacity(message.len() * 8);
    for byte in message.bytes() {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1 == 1);
        }
    }
    bits
}

/// Wall-clock timestamp `HH:MM:SS:mmm:uuu` for the High/Low stream
fn wall_clock_stamp() -> String {
    let now = Local::now();
    let micros = now.timestamp_subsec_micros();
    format!(
        "{}:{:03}:{:03}",
        now.format("%H:%M:%S"),
        micros / 1000,
        micros % 1000
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn args(message: &str, switch_time_ms: f64, sleep_fraction: f64) -> TransmitArgs {
        TransmitArgs {
            mode: "read".to_string(),
            parallelism: 1,
            warmup: 0,
            buffer_size: 4096,
            message: message.to_string(),
            switch_time_ms,
            sleep_fraction,
        }
    }

    #[test]
    fn letter_a_encodes_msb_first() {
        assert_eq!(
            encode_bits("A"),
            [false, true, false, false, false, false, false, true]
        );
    }

    #[test]
    fn every_byte_yields_eight_bits() {
        assert_eq!(encode_bits("Hello, world").len(), 12 * 8);
        assert!(encode_bits("").is_empty());
    }

    #[test]
    fn rejects_empty_message() {
        let err = run(&args("", 10.0, 0.0)).unwrap_err();
        assert!(err.to_string().contains("message"));
    }

    #[test]
    fn rejects_sleep_fraction_of_one_or_more() {
        for fraction in [1.0, 1.5, -0.1, f64::NAN] {
            let err = run(&args("A", 10.0, fraction)).unwrap_err();
            assert!(err.to_string().contains("sleep fraction"));
        }
    }

    #[test]
    fn rejects_non_positive_switch_time() {
        for ms in [0.0, -5.0, f64::NAN] {
            let err = run(&args("A", ms, 0.0)).unwrap_err();
            assert!(err.to_string().contains("switch time"));
        }
    }

    #[test]
    fn rejects_switch_time_below_the_sleep_floor() {
        let err = run(&args("A", 0.0001, 0.0)).unwrap_err();
        assert!(err.to_string().contains("sleep floor"));
    }

    #[test]
    fn wall_clock_stamp_has_five_fields() {
        let stamp = wall_clock_stamp();
        let parts: Vec<&str> = stamp.split(':').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[3].len(), 3);
        assert_eq!(parts[4].len(), 3);
    }

    proptest! {
        #[test]
        fn bits_reconstruct_every_byte_msb_first(message in "[ -~]{1,64}") {
            let bits = encode_bits(&message);
            prop_assert_eq!(bits.len(), message.len() * 8);
            for (byte, chunk) in message.bytes().zip(bits.chunks(8)) {
                let mut rebuilt = 0u8;
                for &bit in chunk {
                    rebuilt = (rebuilt << 1) | u8::from(bit);
                }
                prop_assert_eq!(rebuilt, byte);
            }
        }
    }
}
