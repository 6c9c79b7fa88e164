//! Contention generator: persistent lane workers plus adaptive run loops.
//!
//! Each lane is one OS thread owning a private read/write buffer pair for
//! the generator's whole lifetime. A burst hands work to every lane over
//! its command channel, then the caller and all lanes rendezvous at a
//! completion barrier. The kernel's trailing fence runs before a lane
//! arrives at the barrier, so every lane's memory traffic is globally
//! visible before the burst's stop timestamp is taken. Lanes share no
//! mutable state and need no locks while a kernel runs.
//!
//! Adaptive runs (`run_for`, `run_until`) compose bursts: a calibration
//! burst seeds a bandwidth estimate, a coarse loop burns most of the
//! target in full-buffer passes while folding fresh samples into a
//! running mean, and a fine loop converges on the deadline with bursts
//! as small as one kernel block.

use crate::buffer::LaneBuffers;
use crate::config::GeneratorTuning;
use crate::kernel::KernelKind;
use crate::mode::ContentionMode;
use crate::result::{SusurroError, SusurroResult};
use crate::sleep::clock_read_overhead;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Barrier};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of one contention burst
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurstMeasurement {
    /// Wall-clock time of the parallel region, fan-out and fan-in included
    pub elapsed: Duration,
    /// Bytes moved per nanosecond, summed across lanes; doubled for Copy
    /// since every byte is both read and written
    pub bytes_per_ns: f64,
}

/// Result of one adaptive duration-targeted run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunMeasurement {
    /// Running mean bandwidth over every burst in the run, in bytes per
    /// nanosecond
    pub bytes_per_ns: f64,
    /// Signed scheduling error in nanoseconds: target minus actual
    /// elapsed, so positive means the run finished early
    pub error_ns: i64,
}

/// Work order published to every lane for one burst
#[derive(Debug, Clone, Copy)]
struct BurstCommand {
    mode: ContentionMode,
    length: usize,
}

/// Memory-contention generator with a fixed set of persistent lanes
#[derive(Debug)]
pub struct ContentionGenerator {
    lanes: Vec<Sender<BurstCommand>>,
    workers: Vec<JoinHandle<()>>,
    done: Arc<Barrier>,
    concurrency: usize,
    buffer_size: usize,
    kernel: KernelKind,
    tuning: GeneratorTuning,
}

impl ContentionGenerator {
    /// Create a generator with default tuning.
    ///
    /// `buffer_size` must be a positive multiple of the selected kernel's
    /// alignment (one kernel block, 512 bytes for AVX2 and 256 bytes
    /// otherwise). Allocation is all-or-none: if any lane's buffer is
    /// refused, everything already acquired is released and the error
    /// propagates.
    pub fn new(concurrency: usize, buffer_size: usize) -> SusurroResult<Self> {
        Self::with_tuning(concurrency, buffer_size, GeneratorTuning::default())
    }

    /// Create a generator with explicit tuning
    pub fn with_tuning(
        concurrency: usize,
        buffer_size: usize,
        tuning: GeneratorTuning,
    ) -> SusurroResult<Self> {
        tuning.validate()?;

        let kernel = match tuning.kernel {
            Some(kind) if !kind.is_supported() => {
                return Err(SusurroError::unsupported_platform(format!(
                    "the {kind} kernel is not available on this host"
                )))
            }
            Some(kind) => kind,
            None => KernelKind::detect(),
        };
        if tuning.kernel.is_none() && kernel == KernelKind::Scalar {
            warn!("no vector kernel available, using the portable scalar kernel");
        }

        if concurrency == 0 {
            return Err(SusurroError::invalid_argument(
                "concurrency must be positive",
            ));
        }
        let alignment = kernel.alignment();
        if buffer_size == 0 || buffer_size < alignment || buffer_size % alignment != 0 {
            return Err(SusurroError::invalid_argument(format!(
                "buffer size must be a positive multiple of the {alignment}-byte kernel alignment, got {buffer_size}"
            )));
        }

        let pairs = LaneBuffers::allocate_lanes(concurrency, buffer_size, alignment)?;
        let done = Arc::new(Barrier::new(concurrency + 1));
        let (lanes, workers) = spawn_lane_workers(pairs, kernel, &done)?;

        debug!(
            concurrency,
            buffer_size,
            kernel = %kernel,
            "contention generator ready"
        );

        Ok(Self {
            lanes,
            workers,
            done,
            concurrency,
            buffer_size,
            kernel,
            tuning,
        })
    }

    /// Number of lanes
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Per-buffer size in bytes
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Kernel selected at construction
    #[must_use]
    pub fn kernel(&self) -> KernelKind {
        self.kernel
    }

    /// Run one full-buffer contention burst across all lanes
    pub fn burst(&mut self, mode: ContentionMode) -> SusurroResult<BurstMeasurement> {
        self.burst_with_length(mode, self.buffer_size)
    }

    /// Run one contention burst of `length` bytes per lane.
    ///
    /// The call is synchronous: it returns once every lane has finished
    /// and fenced its traffic. Lengths are consumed in whole kernel
    /// blocks; a sub-block tail is skipped.
    pub fn burst_with_length(
        &mut self,
        mode: ContentionMode,
        length: usize,
    ) -> SusurroResult<BurstMeasurement> {
        if length == 0 {
            return Err(SusurroError::invalid_argument(
                "burst length must be positive",
            ));
        }
        if length > self.buffer_size {
            return Err(SusurroError::invalid_argument(format!(
                "burst length {length} exceeds the buffer size {}",
                self.buffer_size
            )));
        }

        let command = BurstCommand { mode, length };
        let start = Instant::now();
        for lane in &self.lanes {
            lane.send(command).map_err(|_| {
                SusurroError::worker_pool("a lane worker exited before the burst")
            })?;
        }
        self.done.wait();
        let elapsed = start.elapsed();

        // Coarse clocks can report zero for a short burst; bandwidth must
        // stay finite.
        let elapsed_ns = elapsed.as_nanos().max(1) as f64;
        let mut bytes_per_ns = (length * self.concurrency) as f64 / elapsed_ns;
        if mode.is_bidirectional() {
            bytes_per_ns *= 2.0;
        }

        Ok(BurstMeasurement {
            elapsed,
            bytes_per_ns,
        })
    }

    /// Keep all lanes saturated for approximately `duration`.
    ///
    /// Returns the running mean bandwidth and the signed error versus the
    /// target. The error is a measured quantity, not corrected after the
    /// fact; for targets of 10 ms and above it stays within a few percent
    /// on an idle host.
    pub fn run_for(
        &mut self,
        mode: ContentionMode,
        duration: Duration,
    ) -> SusurroResult<RunMeasurement> {
        if duration < self.tuning.min_run_duration {
            return Err(SusurroError::invalid_argument(format!(
                "run duration {duration:?} is below the {:?} minimum",
                self.tuning.min_run_duration
            )));
        }
        let start = Instant::now();
        self.run_span(mode, start, duration)
    }

    /// Keep all lanes saturated until `deadline`.
    ///
    /// The deadline must be at least the minimum run duration in the
    /// future. The signed error is measured against the deadline itself.
    pub fn run_until(
        &mut self,
        mode: ContentionMode,
        deadline: Instant,
    ) -> SusurroResult<RunMeasurement> {
        let start = Instant::now();
        let remaining = deadline.checked_duration_since(start).unwrap_or_default();
        if remaining < self.tuning.min_run_duration {
            return Err(SusurroError::invalid_argument(format!(
                "deadline must be at least {:?} in the future",
                self.tuning.min_run_duration
            )));
        }
        self.run_span(mode, start, remaining)
    }

    /// Shared body of the adaptive runs, anchored at `start`.
    fn run_span(
        &mut self,
        mode: ContentionMode,
        start: Instant,
        duration: Duration,
    ) -> SusurroResult<RunMeasurement> {
        let epsilon = clock_read_overhead();

        // Seed the bandwidth estimate. The calibration length is clamped
        // to the buffer so small generators stay usable.
        let calibration = self.tuning.calibration_burst_bytes.min(self.buffer_size);
        let mut bytes_per_ns = self.burst_with_length(mode, calibration)?.bytes_per_ns;
        let mut samples = 1u64;
        debug!(%mode, bytes_per_ns, "calibration burst complete");

        // Coarse phase: full-buffer passes until all but the reserved
        // subdivisions of the target have elapsed.
        let duration_ns = duration.as_nanos();
        let coarse_ns = duration_ns * (self.tuning.coarse_subdivisor - self.tuning.coarse_reserve) as u128
            / self.tuning.coarse_subdivisor as u128;
        let coarse_end = start + Duration::from_nanos(coarse_ns as u64);
        while Instant::now() < coarse_end {
            let length =
                self.sized_length(duration, bytes_per_ns, self.tuning.coarse_subdivisor, self.buffer_size);
            let burst = self.burst_with_length(mode, length)?;
            bytes_per_ns =
                (bytes_per_ns * samples as f64 + burst.bytes_per_ns) / (samples as f64 + 1.0);
            samples += 1;
        }

        // Fine phase: converge on the deadline with bursts as small as
        // one kernel block, stopping one clock read short of the target.
        if self.tuning.coarse_reserve > 0 {
            let fine_end = start + duration.saturating_sub(epsilon);
            let floor = self.kernel.block_bytes();
            while Instant::now() < fine_end {
                let length =
                    self.sized_length(duration, bytes_per_ns, self.tuning.fine_subdivisor, floor);
                let burst = self.burst_with_length(mode, length)?;
                bytes_per_ns =
                    (bytes_per_ns * samples as f64 + burst.bytes_per_ns) / (samples as f64 + 1.0);
                samples += 1;
            }
        }

        let actual = start.elapsed();
        let error_ns = duration.as_nanos() as i64 - actual.as_nanos() as i64;
        debug!(samples, bytes_per_ns, error_ns, "adaptive run complete");

        Ok(RunMeasurement {
            bytes_per_ns,
            error_ns,
        })
    }

    /// Burst length targeting `1/subdivisor` of the whole run's byte
    /// volume at the current bandwidth estimate, clamped between `floor`
    /// and the buffer size.
    fn sized_length(
        &self,
        duration: Duration,
        bytes_per_ns: f64,
        subdivisor: u64,
        floor: usize,
    ) -> usize {
        let estimate =
            (duration.as_nanos() as f64 * bytes_per_ns) as usize / (100 * subdivisor as usize);
        estimate.clamp(floor, self.buffer_size)
    }
}

impl Drop for ContentionGenerator {
    fn drop(&mut self) {
        // Disconnecting the command channels ends every worker's receive
        // loop; buffers are freed inside the workers as they exit.
        self.lanes.clear();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Spawn one worker per lane, handing each its buffer pair. If a spawn
/// fails, the already-started workers are shut down and joined before the
/// error propagates.
fn spawn_lane_workers(
    pairs: Vec<LaneBuffers>,
    kernel: KernelKind,
    done: &Arc<Barrier>,
) -> SusurroResult<(Vec<Sender<BurstCommand>>, Vec<JoinHandle<()>>)> {
    let mut lanes = Vec::with_capacity(pairs.len());
    let mut workers = Vec::with_capacity(pairs.len());

    for (index, buffers) in pairs.into_iter().enumerate() {
        let (sender, receiver) = mpsc::channel();
        let barrier = Arc::clone(done);
        let spawned = std::thread::Builder::new()
            .name(format!("susurro-lane-{index}"))
            .spawn(move || lane_worker(&receiver, &barrier, kernel, buffers));

        match spawned {
            Ok(handle) => {
                lanes.push(sender);
                workers.push(handle);
            }
            Err(e) => {
                lanes.clear();
                for worker in workers {
                    let _ = worker.join();
                }
                return Err(SusurroError::worker_pool(format!(
                    "failed to spawn lane worker {index}: {e}"
                )));
            }
        }
    }

    Ok((lanes, workers))
}

/// Lane worker loop: run each commanded burst over the lane's own
/// buffers, then rendezvous at the completion barrier. Exits when the
/// generator drops its command channel.
fn lane_worker(
    commands: &Receiver<BurstCommand>,
    done: &Barrier,
    kernel: KernelKind,
    mut buffers: LaneBuffers,
) {
    while let Ok(command) = commands.recv() {
        let length = command.length.min(buffers.len());
        unsafe {
            kernel.run(command.mode, buffers.read_ptr(), buffers.write_ptr(), length);
        }
        done.wait();
    }
}
