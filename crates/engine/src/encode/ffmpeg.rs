//! ffmpeg encoder for audio-fanout
//!
//! Builds and runs one ffmpeg invocation per input file.

use super::{EncodeError, EncodeRequest, Encoder};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Runs the external ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// Build an ffmpeg command for one file
///
/// Creates a Command configured with:
/// - Quiet output (`-nostats -loglevel 0`), console streams discarded
/// - Never overwrite (`-n`), so ffmpeg cannot block on a prompt
/// - Audio only (`-vn`), codec and quality parameter from the profile
/// - Metadata passthrough (`-map_metadata 0`)
/// - Optional sample rate (`-ar`) and channel count (`-ac`) overrides
pub fn build_ffmpeg_command(program: &Path, request: &EncodeRequest) -> Command {
    let mut cmd = Command::new(program);
    let format = request.profile.format;

    cmd.arg("-nostats").arg("-loglevel").arg("0").arg("-n");
    cmd.arg("-i").arg(&request.input);
    cmd.arg("-vn");
    cmd.arg("-c:a").arg(format.codec());

    if let Some(flag) = format.quality_flag() {
        cmd.arg(flag).arg(request.profile.quality_param);
    }

    cmd.arg("-map_metadata").arg("0");

    if format == crate::profile::OutputFormat::Mp3 {
        cmd.arg("-id3v2_version").arg("3");
    }

    if let Some(rate) = request.options.sample_rate {
        cmd.arg("-ar").arg(rate.to_string());
    }
    if let Some(channels) = request.options.channels {
        cmd.arg("-ac").arg(channels.to_string());
    }

    cmd.arg(&request.output);

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    cmd
}

impl Encoder for FfmpegEncoder {
    /// Spawns ffmpeg and waits for it.
    ///
    /// The child is killed if this future is dropped before it exits.
    async fn encode(&self, request: &EncodeRequest) -> Result<(), EncodeError> {
        let mut cmd = tokio::process::Command::from(build_ffmpeg_command(&self.program, request));
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let status = child.wait().await?;

        if status.success() {
            Ok(())
        } else {
            match status.code() {
                Some(code) => Err(EncodeError::Failed(code)),
                None => Err(EncodeError::Terminated),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::EncodeOptions;
    use crate::profile::{EncodingProfile, OutputFormat, QualityTier};
    use proptest::prelude::*;
    use std::ffi::OsStr;

    fn get_command_args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .filter_map(|arg| arg.to_str().map(String::from))
            .collect()
    }

    fn has_flag_with_value(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|pair| pair[0] == flag && pair[1] == value)
    }

    fn has_flag(args: &[String], flag: &str) -> bool {
        args.iter().any(|arg| arg == flag)
    }

    fn request(format: OutputFormat, tier: QualityTier) -> EncodeRequest {
        EncodeRequest {
            input: PathBuf::from("/music/in/track.flac"),
            output: PathBuf::from("/music/out/track.mp3"),
            profile: EncodingProfile::new(format, Some(tier)).unwrap(),
            options: EncodeOptions::default(),
        }
    }

    #[test]
    fn test_mp3_command_matches_reference_invocation() {
        let cmd = build_ffmpeg_command(Path::new("ffmpeg"), &request(OutputFormat::Mp3, QualityTier::Medium));
        let args = get_command_args(&cmd);

        assert_eq!(cmd.get_program(), OsStr::new("ffmpeg"));
        assert!(has_flag(&args, "-nostats"));
        assert!(has_flag_with_value(&args, "-loglevel", "0"));
        assert!(has_flag_with_value(&args, "-i", "/music/in/track.flac"));
        assert!(has_flag(&args, "-vn"));
        assert!(has_flag_with_value(&args, "-c:a", "libmp3lame"));
        assert!(has_flag_with_value(&args, "-q:a", "5"));
        assert!(has_flag_with_value(&args, "-map_metadata", "0"));
        assert!(has_flag_with_value(&args, "-id3v2_version", "3"));
        assert_eq!(args.last().map(String::as_str), Some("/music/out/track.mp3"));
        assert!(!has_flag(&args, "-ar"));
        assert!(!has_flag(&args, "-ac"));
    }

    #[test]
    fn test_uncompressed_formats_have_no_quality_flag() {
        let cmd = build_ffmpeg_command(Path::new("ffmpeg"), &request(OutputFormat::Wav, QualityTier::Low));
        let args = get_command_args(&cmd);

        assert!(has_flag_with_value(&args, "-c:a", "pcm_s16le"));
        assert!(!has_flag(&args, "-q:a"));
        assert!(!has_flag(&args, "-b:a"));
        assert!(!has_flag(&args, "-compression_level"));
        assert!(!has_flag(&args, "-id3v2_version"));
    }

    #[test]
    fn test_overrides_are_passed() {
        let mut req = request(OutputFormat::Opus, QualityTier::High);
        req.options = EncodeOptions {
            sample_rate: Some(48000),
            channels: Some(2),
        };
        let cmd = build_ffmpeg_command(Path::new("/opt/bin/ffmpeg"), &req);
        let args = get_command_args(&cmd);

        assert_eq!(cmd.get_program(), OsStr::new("/opt/bin/ffmpeg"));
        assert!(has_flag_with_value(&args, "-b:a", "128k"));
        assert!(has_flag_with_value(&args, "-ar", "48000"));
        assert!(has_flag_with_value(&args, "-ac", "2"));
        assert_eq!(args.last().map(String::as_str), Some("/music/out/track.mp3"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let encoder = FfmpegEncoder::new("/nonexistent/definitely-not-ffmpeg");
        let result = encoder.encode(&request(OutputFormat::Mp3, QualityTier::Low)).await;
        assert!(matches!(result, Err(EncodeError::Io(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_command_completeness(
            format_idx in 0usize..OutputFormat::ALL.len(),
            tier_idx in 0usize..QualityTier::ALL.len(),
            input in "[a-zA-Z0-9_/.-]{1,40}",
            output in "[a-zA-Z0-9_/.-]{1,40}",
            sample_rate in proptest::option::of(8000u32..192_000),
        ) {
            let format = OutputFormat::ALL[format_idx];
            let tier = QualityTier::ALL[tier_idx];
            let req = EncodeRequest {
                input: PathBuf::from(&input),
                output: PathBuf::from(&output),
                profile: EncodingProfile::new(format, Some(tier)).unwrap(),
                options: EncodeOptions { sample_rate, channels: None },
            };

            let cmd = build_ffmpeg_command(Path::new("ffmpeg"), &req);
            let args = get_command_args(&cmd);

            prop_assert!(has_flag_with_value(&args, "-i", &input));
            prop_assert!(has_flag_with_value(&args, "-c:a", format.codec()));
            prop_assert!(has_flag_with_value(&args, "-map_metadata", "0"));
            if let Some(flag) = format.quality_flag() {
                prop_assert!(has_flag_with_value(&args, flag, req.profile.quality_param));
            }
            if let Some(rate) = sample_rate {
                prop_assert!(has_flag_with_value(&args, "-ar", &rate.to_string()));
            }
            prop_assert_eq!(args.last(), Some(&output));
        }
    }
}
