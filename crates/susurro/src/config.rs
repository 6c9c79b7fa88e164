//! Tuning knobs for the contention generator and the precise sleep.
//!
//! Every constant here is a host-calibrated magic number. The defaults were
//! measured on idle x86_64 and aarch64 Linux hosts and are good starting
//! points, but deployments on unusual kernels or schedulers should re-derive
//! them (see the field docs for what each one trades off).

use crate::kernel::KernelKind;
use crate::result::{SusurroError, SusurroResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest run or sleep worth attempting.
///
/// Below roughly half a microsecond the fixed cost of taking timestamps and
/// crossing the call boundary dominates whatever is being measured, so both
/// engines reject shorter targets outright.
pub const MIN_TARGET_DURATION: Duration = Duration::from_nanos(500);

/// Tuning for [`ContentionGenerator`](crate::ContentionGenerator)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratorTuning {
    /// Shortest duration `run_for`/`run_until` accepts
    pub min_run_duration: Duration,
    /// Byte length of the calibration burst that seeds the bandwidth
    /// estimate at the start of every adaptive run
    pub calibration_burst_bytes: usize,
    /// Subdivision count for the coarse phase of an adaptive run. Burst
    /// lengths aim at `1/subdivisor` of the remaining work; more
    /// subdivisions give tighter timing but choppier contention.
    pub coarse_subdivisor: u64,
    /// How many coarse subdivisions of the target duration are reserved for
    /// the fine phase. `0` disables the fine phase entirely.
    pub coarse_reserve: u64,
    /// Subdivision count for the fine phase that converges on the deadline
    pub fine_subdivisor: u64,
    /// Force a specific kernel instead of auto-detecting one. Construction
    /// fails with `UnsupportedPlatform` if the host cannot run it.
    pub kernel: Option<KernelKind>,
}

impl Default for GeneratorTuning {
    fn default() -> Self {
        Self {
            min_run_duration: MIN_TARGET_DURATION,
            calibration_burst_bytes: 10_000_000,
            coarse_subdivisor: 100,
            coarse_reserve: 1,
            fine_subdivisor: 1000,
            kernel: None,
        }
    }
}

impl GeneratorTuning {
    /// Tuning with the fine phase disabled: the coarse loop runs all the
    /// way to the deadline in `1/coarse_subdivisor` steps.
    #[must_use]
    pub fn coarse_only() -> Self {
        Self {
            coarse_reserve: 0,
            ..Default::default()
        }
    }

    /// Check the tuning for internally inconsistent values
    pub fn validate(&self) -> SusurroResult<()> {
        if self.min_run_duration.is_zero() {
            return Err(SusurroError::invalid_argument(
                "min_run_duration must be positive",
            ));
        }
        if self.calibration_burst_bytes == 0 {
            return Err(SusurroError::invalid_argument(
                "calibration_burst_bytes must be positive",
            ));
        }
        if self.coarse_subdivisor == 0 || self.fine_subdivisor == 0 {
            return Err(SusurroError::invalid_argument(
                "subdivisors must be positive",
            ));
        }
        if self.coarse_reserve >= self.coarse_subdivisor {
            return Err(SusurroError::invalid_argument(format!(
                "coarse_reserve ({}) must be below coarse_subdivisor ({})",
                self.coarse_reserve, self.coarse_subdivisor
            )));
        }
        Ok(())
    }
}

/// Tuning for [`sleep_for`](crate::sleep_for) and
/// [`sleep_until`](crate::sleep_until)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepTuning {
    /// Shortest sleep accepted
    pub min_sleep_duration: Duration,
    /// Approximate upper bound on how long the OS may overshoot one
    /// blocking sleep. 6 ms covers a scheduler time-slice plus wakeup
    /// latency on stock Linux (`sysctl kernel.sched_latency_ns` and
    /// friends); hosts tuned for lower latency can shrink it.
    pub coarse_period: Duration,
    /// How many extra coarse periods to shift from blocking into spinning.
    /// Each reserved period costs up to `coarse_period` of busy-wait CPU
    /// and buys one period of scheduler jitter removed from the tail.
    pub coarse_reserve_periods: u32,
}

impl Default for SleepTuning {
    fn default() -> Self {
        Self {
            min_sleep_duration: MIN_TARGET_DURATION,
            coarse_period: Duration::from_millis(6),
            coarse_reserve_periods: 1,
        }
    }
}

impl SleepTuning {
    /// Check the tuning for internally inconsistent values
    pub fn validate(&self) -> SusurroResult<()> {
        if self.min_sleep_duration.is_zero() {
            return Err(SusurroError::invalid_argument(
                "min_sleep_duration must be positive",
            ));
        }
        if self.coarse_period.is_zero() {
            return Err(SusurroError::invalid_argument(
                "coarse_period must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_defaults_match_documented_constants() {
        let tuning = GeneratorTuning::default();
        assert_eq!(tuning.min_run_duration, Duration::from_nanos(500));
        assert_eq!(tuning.calibration_burst_bytes, 10_000_000);
        assert_eq!(tuning.coarse_subdivisor, 100);
        assert_eq!(tuning.coarse_reserve, 1);
        assert_eq!(tuning.fine_subdivisor, 1000);
        assert!(tuning.kernel.is_none());
    }

    #[test]
    fn sleep_defaults_match_documented_constants() {
        let tuning = SleepTuning::default();
        assert_eq!(tuning.min_sleep_duration, Duration::from_nanos(500));
        assert_eq!(tuning.coarse_period, Duration::from_millis(6));
        assert_eq!(tuning.coarse_reserve_periods, 1);
    }

    #[test]
    fn default_tunings_validate() {
        assert!(GeneratorTuning::default().validate().is_ok());
        assert!(GeneratorTuning::coarse_only().validate().is_ok());
        assert!(SleepTuning::default().validate().is_ok());
    }

    #[test]
    fn zero_subdivisor_is_rejected() {
        let tuning = GeneratorTuning {
            coarse_subdivisor: 0,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());

        let tuning = GeneratorTuning {
            fine_subdivisor: 0,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn reserve_must_leave_room_for_coarse_phase() {
        let tuning = GeneratorTuning {
            coarse_subdivisor: 10,
            coarse_reserve: 10,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn zero_durations_are_rejected() {
        let tuning = GeneratorTuning {
            min_run_duration: Duration::ZERO,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());

        let tuning = SleepTuning {
            coarse_period: Duration::ZERO,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn coarse_only_disables_fine_phase() {
        assert_eq!(GeneratorTuning::coarse_only().coarse_reserve, 0);
    }
}
