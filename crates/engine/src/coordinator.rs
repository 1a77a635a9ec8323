//! Job coordinator for audio-fanout
//!
//! Validates a start request, discovers and partitions the input files, runs
//! one [`EncodeWorker`] per batch and folds their messages into progress and a
//! single completion event.
//!
//! State machine: `Idle -> Validating -> Running -> Completing -> Idle`.

use crate::discovery::{discover_nonempty, DiscoveryReport, EmptyDiscovery, ExtensionFilter};
use crate::encode::{EncodeOptions, Encoder};
use crate::partition::partition;
use crate::profile::{EncodingProfile, OutputFormat, QualityTier};
use crate::progress::ProgressCounter;
use crate::worker::{EncodeWorker, FileOutcome, WorkerMessage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Reasons a start request is refused. The job never starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("A conversion job is already running")]
    JobAlreadyRunning,

    #[error("Source folder is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("Destination folder is not a directory: {}", .0.display())]
    DestNotDirectory(PathBuf),

    #[error("Number of workers must be at least 1")]
    InvalidWorkerCount,

    #[error("Incomplete encoding profile: {0}")]
    IncompleteProfile(String),

    #[error(transparent)]
    NoFilesFound(#[from] EmptyDiscovery),

    #[error("File discovery failed: {0}")]
    DiscoveryFailed(String),
}

/// Lifecycle of the coordinator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    #[default]
    Idle,
    Validating,
    Running,
    Completing,
}

impl CoordinatorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinatorState::Idle => "idle",
            CoordinatorState::Validating => "validating",
            CoordinatorState::Running => "running",
            CoordinatorState::Completing => "completing",
        }
    }
}

/// Coordinator state plus the bookkeeping of the running job, if any
#[derive(Debug, Clone, Default)]
pub struct JobStatus {
    pub state: CoordinatorState,
    pub started_at: Option<Instant>,
    cancel: Option<CancellationToken>,
}

/// Shared job status, read by telemetry
pub type SharedJobStatus = Arc<RwLock<JobStatus>>;

/// Parameters of one conversion run
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    pub workers: usize,
    pub format: Option<OutputFormat>,
    pub tier: Option<QualityTier>,
    pub options: EncodeOptions,
}

/// Totals reported once per job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub total_files: usize,
    pub encoded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Notifications sent to the observer of a coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    FilesDiscovered {
        counts: BTreeMap<String, usize>,
        total: usize,
    },
    JobStarted {
        total_files: usize,
        workers: usize,
        profile: EncodingProfile,
    },
    Progress {
        remaining: usize,
        total: usize,
        file: PathBuf,
        outcome: FileOutcome,
    },
    WorkerFinished {
        worker: usize,
        cancelled: bool,
    },
    JobComplete(JobSummary),
    Warning(String),
    Error(String),
}

/// Handle to a started job
pub struct JobHandle {
    cancel: CancellationToken,
    task: JoinHandle<JobSummary>,
}

impl JobHandle {
    /// Signals every worker to stop. Running encoder processes are killed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves once the job is complete and the coordinator is idle again.
    pub async fn wait(self) -> Result<JobSummary, JoinError> {
        self.task.await
    }
}

/// Runs at most one conversion job at a time.
pub struct JobCoordinator<E> {
    encoder: Arc<E>,
    filter: ExtensionFilter,
    events: mpsc::UnboundedSender<JobEvent>,
    status: SharedJobStatus,
    progress: ProgressCounter,
}

impl<E: Encoder> JobCoordinator<E> {
    pub fn new(encoder: E, filter: ExtensionFilter, events: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self {
            encoder: Arc::new(encoder),
            filter,
            events,
            status: Arc::new(RwLock::new(JobStatus::default())),
            progress: ProgressCounter::new(),
        }
    }

    pub async fn state(&self) -> CoordinatorState {
        self.status.read().await.state
    }

    pub fn status(&self) -> SharedJobStatus {
        self.status.clone()
    }

    pub fn progress(&self) -> ProgressCounter {
        self.progress.clone()
    }

    /// Cancels the running job, if any. Returns whether there was one.
    pub async fn cancel(&self) -> bool {
        match &self.status.read().await.cancel {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Validates the request and starts the job.
    ///
    /// Returns once every worker is spawned. A refused request is also
    /// reported as one `Warning` event.
    pub async fn start(&self, request: JobRequest) -> Result<JobHandle, ValidationError> {
        {
            let mut status = self.status.write().await;
            if status.state != CoordinatorState::Idle {
                drop(status);
                return Err(self.reject(ValidationError::JobAlreadyRunning));
            }
            status.state = CoordinatorState::Validating;
        }

        let (profile, report) = match self.validate(&request).await {
            Ok(validated) => validated,
            Err(e) => {
                self.status.write().await.state = CoordinatorState::Idle;
                return Err(self.reject(e));
            }
        };

        Ok(self.launch(request, profile, report).await)
    }

    fn reject(&self, e: ValidationError) -> ValidationError {
        warn!("Job not started: {}", e);
        let _ = self.events.send(JobEvent::Warning(e.to_string()));
        e
    }

    async fn validate(
        &self,
        request: &JobRequest,
    ) -> Result<(EncodingProfile, DiscoveryReport), ValidationError> {
        if !request.source_root.is_dir() {
            return Err(ValidationError::SourceNotDirectory(request.source_root.clone()));
        }
        if !request.dest_root.is_dir() {
            return Err(ValidationError::DestNotDirectory(request.dest_root.clone()));
        }
        if request.workers < 1 {
            return Err(ValidationError::InvalidWorkerCount);
        }

        let format = request.format.ok_or_else(|| {
            ValidationError::IncompleteProfile("no output format selected".to_string())
        })?;
        let profile = EncodingProfile::new(format, request.tier)
            .map_err(|e| ValidationError::IncompleteProfile(e.to_string()))?;

        let root = request.source_root.clone();
        let filter = self.filter.clone();
        let report = tokio::task::spawn_blocking(move || discover_nonempty(&root, &filter))
            .await
            .map_err(|e| ValidationError::DiscoveryFailed(e.to_string()))??;

        Ok((profile, report))
    }

    async fn launch(
        &self,
        request: JobRequest,
        profile: EncodingProfile,
        report: DiscoveryReport,
    ) -> JobHandle {
        let total = report.total();
        let DiscoveryReport { files, counts } = report;
        let batches = partition(files, request.workers);
        let workers = batches.len();

        let cancel = CancellationToken::new();
        let started_at = Instant::now();
        self.progress.reset(total);
        {
            let mut status = self.status.write().await;
            status.state = CoordinatorState::Running;
            status.started_at = Some(started_at);
            status.cancel = Some(cancel.clone());
        }

        info!(
            "Converting {} files to {} with {} workers",
            total, profile, workers
        );
        let _ = self.events.send(JobEvent::FilesDiscovered { counts, total });
        let _ = self.events.send(JobEvent::JobStarted {
            total_files: total,
            workers,
            profile,
        });

        let (tx, rx) = mpsc::unbounded_channel();
        for (id, batch) in batches.into_iter().enumerate() {
            let worker = EncodeWorker::new(
                id,
                batch,
                request.source_root.clone(),
                request.dest_root.clone(),
                profile,
                request.options,
                self.encoder.clone(),
            );
            tokio::spawn(worker.run(tx.clone(), cancel.clone()));
        }
        // Workers hold the only senders now
        drop(tx);

        let aggregator = Aggregator {
            events: self.events.clone(),
            status: self.status.clone(),
            progress: self.progress.clone(),
            cancel: cancel.clone(),
            started_at,
            workers,
            total,
        };

        JobHandle {
            cancel,
            task: tokio::spawn(aggregator.run(rx)),
        }
    }
}

/// Sole consumer of worker messages and sole writer of the progress counter
struct Aggregator {
    events: mpsc::UnboundedSender<JobEvent>,
    status: SharedJobStatus,
    progress: ProgressCounter,
    cancel: CancellationToken,
    started_at: Instant,
    workers: usize,
    total: usize,
}

impl Aggregator {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<WorkerMessage>) -> JobSummary {
        let mut active = self.workers;
        let mut summary = JobSummary {
            total_files: self.total,
            ..JobSummary::default()
        };

        while active > 0 {
            let Some(message) = rx.recv().await else {
                break;
            };

            match message {
                WorkerMessage::FileDone {
                    path, outcome, ..
                } => {
                    match outcome {
                        FileOutcome::Encoded => summary.encoded += 1,
                        FileOutcome::Skipped => summary.skipped += 1,
                        FileOutcome::EncoderFailed(_) => summary.failed += 1,
                    }
                    let remaining = self.progress.decrement();
                    let _ = self.events.send(JobEvent::Progress {
                        remaining,
                        total: self.total,
                        file: path,
                        outcome,
                    });
                }
                WorkerMessage::WorkerDone { worker, cancelled } => {
                    active -= 1;
                    summary.cancelled |= cancelled;
                    let _ = self.events.send(JobEvent::WorkerFinished { worker, cancelled });
                }
            }
        }

        // Channel closed early: a worker task died without reporting
        if active > 0 {
            error!("{} worker(s) stopped without reporting", active);
            let _ = self.events.send(JobEvent::Error(format!(
                "{} worker(s) stopped without reporting",
                active
            )));
        }

        self.status.write().await.state = CoordinatorState::Completing;

        summary.cancelled |= self.cancel.is_cancelled();
        summary.elapsed = self.started_at.elapsed();
        self.progress.clear();

        {
            let mut status = self.status.write().await;
            status.state = CoordinatorState::Idle;
            status.started_at = None;
            status.cancel = None;
        }

        info!(
            encoded = summary.encoded,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Job complete in {:.1}s",
            summary.elapsed.as_secs_f64()
        );
        let _ = self.events.send(JobEvent::JobComplete(summary.clone()));
        summary
    }
}
