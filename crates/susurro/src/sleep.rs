//! Precise hybrid sleep.
//!
//! OS blocking sleeps are cheap but jitter on the order of a scheduler
//! time-slice; busy-spinning is sub-microsecond accurate but burns a core
//! for the whole wait. The hybrid blocks for all but the last period or
//! two of the target, then spins on the monotonic clock for the
//! remainder, subtracting the measured clock-read overhead from the
//! deadline so the final read itself does not push past it. Based on the
//! approach described at <https://blog.bearcats.nl/perfect-sleep-function/>.
//!
//! Both functions return the signed scheduling error in nanoseconds
//! (target minus actual, positive when the sleep ended early). Residual
//! error is an expected, measured quantity; nothing corrects it after the
//! fact.

use crate::config::SleepTuning;
use crate::result::{SusurroError, SusurroResult};
use std::time::{Duration, Instant};

/// Sleep for `duration` with default tuning, returning the signed error
/// in nanoseconds.
pub fn sleep_for(duration: Duration) -> SusurroResult<i64> {
    sleep_for_with_tuning(duration, &SleepTuning::default())
}

/// Sleep until `deadline` with default tuning, returning the signed error
/// in nanoseconds.
pub fn sleep_until(deadline: Instant) -> SusurroResult<i64> {
    sleep_until_with_tuning(deadline, &SleepTuning::default())
}

/// Sleep for `duration` under an explicit tuning.
///
/// Fails with `InvalidArgument` when `duration` is below the tuned
/// minimum. Durations under two coarse periods skip the blocking phase
/// and spin the whole way.
pub fn sleep_for_with_tuning(duration: Duration, tuning: &SleepTuning) -> SusurroResult<i64> {
    tuning.validate()?;
    if duration < tuning.min_sleep_duration {
        return Err(SusurroError::invalid_argument(format!(
            "sleep duration {duration:?} is below the {:?} minimum",
            tuning.min_sleep_duration
        )));
    }

    let start = Instant::now();

    // Coarse phase: block for all whole periods but the last one. The
    // final period is left to the spin so one scheduler overshoot cannot
    // blow the deadline.
    let coarse = coarse_sleep_length(duration, tuning.coarse_period, 1);
    if !coarse.is_zero() {
        std::thread::sleep(coarse);
    }

    // Fine phase: spin up to the deadline, stopping one clock read early.
    let epsilon = clock_read_overhead();
    let end_target = start + duration.saturating_sub(epsilon);
    while Instant::now() < end_target {
        std::hint::spin_loop();
    }

    let actual = start.elapsed();
    Ok(duration.as_nanos() as i64 - actual.as_nanos() as i64)
}

/// Sleep until `deadline` under an explicit tuning.
///
/// Fails with `InvalidArgument` when `deadline` is at or before now plus
/// the tuned minimum. `coarse_reserve_periods` periods are shifted from
/// blocking into spinning.
pub fn sleep_until_with_tuning(deadline: Instant, tuning: &SleepTuning) -> SusurroResult<i64> {
    tuning.validate()?;

    let start = Instant::now();
    let remaining = deadline.checked_duration_since(start).unwrap_or_default();
    if remaining <= tuning.min_sleep_duration {
        return Err(SusurroError::invalid_argument(format!(
            "deadline must be more than {:?} in the future",
            tuning.min_sleep_duration
        )));
    }

    let coarse = coarse_sleep_length(
        remaining,
        tuning.coarse_period,
        tuning.coarse_reserve_periods,
    );
    if !coarse.is_zero() {
        std::thread::sleep(coarse);
    }

    let epsilon = clock_read_overhead();
    let end_target = deadline - epsilon;
    while Instant::now() < end_target {
        std::hint::spin_loop();
    }

    let end = Instant::now();
    let error_ns = match deadline.checked_duration_since(end) {
        Some(early) => early.as_nanos() as i64,
        None => -(end.duration_since(deadline).as_nanos() as i64),
    };
    Ok(error_ns)
}

/// Whole periods in `span`, minus the reserved ones, as a blocking-sleep
/// length. Zero when the span is too short to block at all.
fn coarse_sleep_length(span: Duration, period: Duration, reserved: u32) -> Duration {
    let periods = span.as_nanos() / period.as_nanos();
    let blocking = periods.saturating_sub(reserved as u128);
    Duration::from_nanos((blocking * period.as_nanos()) as u64)
}

/// Cost of one monotonic clock read, measured with two back-to-back
/// timestamps. The adaptive run loops reuse this same discipline for
/// their own deadline math.
pub(crate) fn clock_read_overhead() -> Duration {
    let first = Instant::now();
    let second = Instant::now();
    second.duration_since(first)
}
