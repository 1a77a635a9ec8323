//! Encoder boundary for audio-fanout
//!
//! One subprocess per input file. The [`Encoder`] trait is the seam between
//! the workers and the external process.

pub mod ffmpeg;

use crate::profile::EncodingProfile;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;

pub use ffmpeg::{build_ffmpeg_command, FfmpegEncoder};

/// Error type for encoding operations
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Encoder exited with non-zero status
    #[error("Encoder failed with exit code: {0}")]
    Failed(i32),

    /// Encoder was terminated by signal
    #[error("Encoder process was terminated by signal")]
    Terminated,

    /// Encoder could not be started or waited on
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Optional output stream overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// Output sample rate in Hz
    pub sample_rate: Option<u32>,
    /// Output channel count
    pub channels: Option<u16>,
}

/// One input file to convert into one output file
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub profile: EncodingProfile,
    pub options: EncodeOptions,
}

/// Converts a single file.
///
/// Dropping the returned future must stop any work it started.
pub trait Encoder: Send + Sync + 'static {
    fn encode(
        &self,
        request: &EncodeRequest,
    ) -> impl Future<Output = Result<(), EncodeError>> + Send;
}
