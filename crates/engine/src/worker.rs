//! Encode worker: converts one batch of files, strictly in order.
//!
//! Workers never touch shared counters. They report each finished file and
//! their own end through [`WorkerMessage`]s to the coordinator.

use crate::encode::{EncodeOptions, EncodeRequest, Encoder};
use crate::profile::{EncodingProfile, OutputFormat};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What happened to one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum FileOutcome {
    /// The encoder ran and exited successfully
    Encoded,
    /// The output already existed; the encoder was not invoked
    Skipped,
    /// The encoder ran and failed; the file stays unconverted until a rerun
    EncoderFailed(String),
}

/// Messages from a worker to its coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    FileDone {
        worker: usize,
        path: PathBuf,
        outcome: FileOutcome,
    },
    /// Sent exactly once, after the last file or on cancellation
    WorkerDone { worker: usize, cancelled: bool },
}

/// Mirrors `input`'s location under `source_root` into `dest_root`, with the
/// extension of `format`.
///
/// Inputs outside `source_root` land directly in `dest_root`.
pub fn output_path_for(
    input: &Path,
    source_root: &Path,
    dest_root: &Path,
    format: OutputFormat,
) -> PathBuf {
    let relative_dir = input
        .parent()
        .and_then(|parent| parent.strip_prefix(source_root).ok())
        .unwrap_or_else(|| Path::new(""));

    let mut file_name = input
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_default();
    file_name.push(".");
    file_name.push(format.extension());

    dest_root.join(relative_dir).join(file_name)
}

/// Creates `dir` and its ancestors. Failures are logged and otherwise ignored.
async fn ensure_dir(dir: &Path) {
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => warn!(dir = %dir.display(), "unable to create destination folder: {}", e),
    }
}

/// Converts one batch sequentially.
pub struct EncodeWorker<E> {
    pub id: usize,
    batch: Vec<PathBuf>,
    source_root: PathBuf,
    dest_root: PathBuf,
    profile: EncodingProfile,
    options: EncodeOptions,
    encoder: Arc<E>,
}

impl<E: Encoder> EncodeWorker<E> {
    pub fn new(
        id: usize,
        batch: Vec<PathBuf>,
        source_root: PathBuf,
        dest_root: PathBuf,
        profile: EncodingProfile,
        options: EncodeOptions,
        encoder: Arc<E>,
    ) -> Self {
        Self {
            id,
            batch,
            source_root,
            dest_root,
            profile,
            options,
            encoder,
        }
    }

    pub fn batch(&self) -> &[PathBuf] {
        &self.batch
    }

    /// Processes the batch, then sends `WorkerDone`.
    ///
    /// Cancellation is checked before each file and raced against a running
    /// encode; an interrupted file gets no `FileDone`.
    pub async fn run(self, tx: mpsc::UnboundedSender<WorkerMessage>, cancel: CancellationToken) {
        let mut cancelled = false;

        for input in &self.batch {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let Some(outcome) = self.process(input, &cancel).await else {
                cancelled = true;
                break;
            };

            let _ = tx.send(WorkerMessage::FileDone {
                worker: self.id,
                path: input.clone(),
                outcome,
            });
        }

        debug!(worker = self.id, cancelled, "worker finished");
        let _ = tx.send(WorkerMessage::WorkerDone {
            worker: self.id,
            cancelled,
        });
    }

    /// Returns `None` when cancelled mid-encode.
    async fn process(&self, input: &Path, cancel: &CancellationToken) -> Option<FileOutcome> {
        let output = output_path_for(input, &self.source_root, &self.dest_root, self.profile.format);

        if let Some(dir) = output.parent() {
            ensure_dir(dir).await;
        }

        if tokio::fs::try_exists(&output).await.unwrap_or(false) {
            debug!(worker = self.id, output = %output.display(), "already converted, skipping");
            return Some(FileOutcome::Skipped);
        }

        let request = EncodeRequest {
            input: input.to_path_buf(),
            output,
            profile: self.profile,
            options: self.options,
        };

        debug!(worker = self.id, input = %input.display(), "encoding");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.encoder.encode(&request) => Some(match result {
                Ok(()) => FileOutcome::Encoded,
                Err(e) => {
                    warn!(worker = self.id, input = %input.display(), "encode failed: {}", e);
                    FileOutcome::EncoderFailed(e.to_string())
                }
            }),
        }
    }
}
