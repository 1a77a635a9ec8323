//! Telemetry for audio-fanout
//!
//! Periodically samples CPU load and file throughput of the running job into
//! a shared snapshot with JSON serialization support.

use crate::coordinator::{CoordinatorState, SharedJobStatus};
use crate::progress::ProgressCounter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::System;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Latest telemetry sample
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySnapshot {
    pub timestamp_unix_ms: i64,
    pub state: CoordinatorState,
    pub cpu_usage_percent: f32,
    pub remaining: usize,
    pub total: usize,
    /// Files finished during the last sampling interval
    pub throughput: usize,
    /// Running mean of `throughput` over the current job
    pub mean_throughput: f64,
    pub elapsed_secs: u64,
    /// Elapsed time as `HHH:MM:SS`
    pub elapsed: String,
}

/// Shared telemetry state, written by the sampler and read by observers
pub type SharedTelemetry = Arc<RwLock<TelemetrySnapshot>>;

pub fn new_shared_telemetry() -> SharedTelemetry {
    Arc::new(RwLock::new(TelemetrySnapshot::default()))
}

/// Formats a duration as `HHH:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:03}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Files-per-interval throughput with a running arithmetic mean.
#[derive(Debug, Clone, Default)]
pub struct ThroughputMeter {
    previous: Option<usize>,
    samples: u64,
    mean: f64,
}

impl ThroughputMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a job of `total` files; the mean starts over.
    pub fn start(&mut self, total: usize) {
        self.reset();
        self.previous = Some(total);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Records the current remaining count and returns the files done since
    /// the previous sample.
    pub fn sample(&mut self, remaining: usize) -> usize {
        let delta = self
            .previous
            .map(|prev| prev.saturating_sub(remaining))
            .unwrap_or(0);
        self.previous = Some(remaining);

        self.samples += 1;
        self.mean += (delta as f64 - self.mean) / self.samples as f64;
        delta
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }
}

/// Global CPU utilisation via sysinfo.
///
/// Usage is computed between two refreshes, so the sampler keeps its
/// `System` alive across calls.
pub struct CpuSampler {
    system: System,
}

impl CpuSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self { system }
    }

    /// Percentage in `0.0..=100.0`
    pub fn sample(&mut self) -> f32 {
        self.system.refresh_cpu_usage();
        self.system.global_cpu_usage().clamp(0.0, 100.0)
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds snapshots from the coordinator's status and progress counter.
pub struct TelemetrySampler {
    status: SharedJobStatus,
    progress: ProgressCounter,
    cpu: CpuSampler,
    meter: ThroughputMeter,
    current_job: Option<Instant>,
}

impl TelemetrySampler {
    pub fn new(status: SharedJobStatus, progress: ProgressCounter) -> Self {
        Self {
            status,
            progress,
            cpu: CpuSampler::new(),
            meter: ThroughputMeter::new(),
            current_job: None,
        }
    }

    /// Takes one sample. Outside a running job every figure is zero.
    pub async fn sample(&mut self) -> TelemetrySnapshot {
        let (state, started_at) = {
            let status = self.status.read().await;
            (status.state, status.started_at)
        };
        // Keep the CPU baseline fresh even while idle
        let cpu = self.cpu.sample();

        if state != CoordinatorState::Running {
            self.meter.reset();
            self.current_job = None;
            return TelemetrySnapshot {
                timestamp_unix_ms: timestamp_unix_ms(),
                state,
                elapsed: format_elapsed(Duration::ZERO),
                ..TelemetrySnapshot::default()
            };
        }

        if started_at != self.current_job {
            self.current_job = started_at;
            self.meter.start(self.progress.total());
        }

        let remaining = self.progress.remaining();
        let throughput = self.meter.sample(remaining);
        let elapsed = started_at.map(|t| t.elapsed()).unwrap_or_default();

        TelemetrySnapshot {
            timestamp_unix_ms: timestamp_unix_ms(),
            state,
            cpu_usage_percent: cpu,
            remaining,
            total: self.progress.total(),
            throughput,
            mean_throughput: self.meter.mean(),
            elapsed_secs: elapsed.as_secs(),
            elapsed: format_elapsed(elapsed),
        }
    }
}

/// Start the telemetry update task
///
/// Samples every `interval` and replaces the shared snapshot. Runs until the
/// returned handle is aborted.
pub fn spawn_telemetry(
    mut sampler: TelemetrySampler,
    shared: SharedTelemetry,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let snapshot = sampler.sample().await;
            *shared.write().await = snapshot;
        }
    })
}

fn timestamp_unix_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
