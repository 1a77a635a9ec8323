//! audio-fanout
//!
//! Parallel batch conversion of a lossless audio library. Files under a source
//! root are split into balanced batches, each worker drives one ffmpeg process
//! per file, and the coordinator turns worker messages into progress events,
//! telemetry and a single completion event.

pub mod coordinator;
pub mod discovery;
pub mod encode;
pub mod partition;
pub mod profile;
pub mod progress;
pub mod startup;
pub mod telemetry;
pub mod telemetry_server;
pub mod worker;

pub use audio_fanout_config as config;
pub use audio_fanout_config::Config;
pub use coordinator::{
    CoordinatorState, JobCoordinator, JobEvent, JobHandle, JobRequest, JobStatus, JobSummary,
    SharedJobStatus, ValidationError,
};
pub use discovery::{discover, discover_nonempty, DiscoveryReport, EmptyDiscovery, ExtensionFilter};
pub use encode::{build_ffmpeg_command, EncodeError, EncodeOptions, EncodeRequest, Encoder, FfmpegEncoder};
pub use partition::{partition, resolve_worker_count};
pub use profile::{EncodingProfile, OutputFormat, ProfileError, QualityTier};
pub use progress::ProgressCounter;
pub use startup::{check_ffmpeg_available, parse_ffmpeg_version, run_startup_checks, StartupError};
pub use telemetry::{
    format_elapsed, new_shared_telemetry, spawn_telemetry, CpuSampler, SharedTelemetry,
    TelemetrySampler, TelemetrySnapshot, ThroughputMeter,
};
pub use telemetry_server::{create_telemetry_router, parse_listen_addr, run_telemetry_server, ServerError};
pub use worker::{output_path_for, EncodeWorker, FileOutcome, WorkerMessage};
