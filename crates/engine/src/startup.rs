//! Startup checks for audio-fanout
//!
//! Verifies that the configured ffmpeg binary can be run before any job is
//! accepted.

use crate::config::Config;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::{info, warn};

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Encoder not available: {0}")]
    EncoderUnavailable(String),
}

/// Check that `<program> -version` executes successfully
///
/// Returns the major version when it can be parsed from the output. An
/// unparseable version is not an error; custom builds print all sorts of
/// version strings.
pub fn check_ffmpeg_available(program: &Path) -> Result<Option<u32>, StartupError> {
    let output = Command::new(program).arg("-version").output().map_err(|e| {
        StartupError::EncoderUnavailable(format!(
            "{} -version failed; is ffmpeg installed and in PATH? Error: {}",
            program.display(),
            e
        ))
    })?;

    if !output.status.success() {
        return Err(StartupError::EncoderUnavailable(format!(
            "{} -version exited with {}",
            program.display(),
            output.status
        )));
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    Ok(parse_ffmpeg_version(&version_output))
}

/// Parse FFmpeg version string and extract major version number
///
/// Handles various FFmpeg version formats:
/// - Standard: "ffmpeg version 7.1 ..."
/// - N-prefixed: "ffmpeg version n7.1-... ..."
pub fn parse_ffmpeg_version(version_output: &str) -> Option<u32> {
    let version_line = version_output
        .lines()
        .find(|line| line.to_lowercase().contains("ffmpeg version"))?;

    let version_part = version_line
        .to_lowercase()
        .split("ffmpeg version")
        .nth(1)?
        .split_whitespace()
        .next()?
        .to_string();

    let version_str = version_part.trim_start_matches('n');

    // Major version sits before the first '.' or '-'
    let major_str = version_str.split(['.', '-']).next()?;

    major_str.parse().ok()
}

/// Run all startup checks against the loaded configuration
pub fn run_startup_checks(cfg: &Config) -> Result<(), StartupError> {
    let program = Path::new(&cfg.encoder.ffmpeg);
    match check_ffmpeg_available(program)? {
        Some(major) => info!("Using {} (major version {})", program.display(), major),
        None => warn!("Could not determine the version of {}", program.display()),
    }
    Ok(())
}
