//! Summary statistics for the harness sample streams

use serde::{Deserialize, Serialize};

/// Summary of one harness's samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    /// Arithmetic mean
    pub mean: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Sample standard deviation (n − 1 denominator, 0 for a single sample)
    pub stddev: f64,
    /// 95th percentile, nearest-rank
    pub p95: f64,
}

impl SampleSummary {
    /// Summarize a sample set. Returns `None` for empty input.
    #[must_use]
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let count = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / count;

        let mut min = samples[0];
        let mut max = samples[0];
        for &sample in samples {
            min = min.min(sample);
            max = max.max(sample);
        }

        let stddev = if samples.len() > 1 {
            let variance = samples
                .iter()
                .map(|sample| (sample - mean).powi(2))
                .sum::<f64>()
                / (count - 1.0);
            variance.sqrt()
        } else {
            0.0
        };

        Some(Self {
            mean,
            min,
            max,
            stddev,
            p95: percentile(samples, 0.95),
        })
    }
}

/// Nearest-rank percentile. The input must be non-empty.
fn percentile(samples: &[f64], fraction: f64) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (fraction * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1)]
}

/// Render a bandwidth summary in GB/s, the receiver's stderr report.
///
/// Bandwidth samples are bytes per nanosecond, numerically equal to
/// decimal gigabytes per second.
#[must_use]
pub fn render_bandwidth_summary(summary: &SampleSummary) -> String {
    format!(
        "Mean: {} GB/s\nMin: {} GB/s\nMax: {} GB/s\nStddev: {} GB/s\n",
        summary.mean, summary.min, summary.max, summary.stddev
    )
}

/// Render a scheduling-error summary in nanoseconds
#[must_use]
pub fn render_error_summary(summary: &SampleSummary) -> String {
    format!(
        "Mean error: {} ns\nMin error: {} ns\nMax error: {} ns\nStddev error: {} ns\nP95 error: {} ns\n",
        summary.mean, summary.min, summary.max, summary.stddev, summary.p95
    )
}
