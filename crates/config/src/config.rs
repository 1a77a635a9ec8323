//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::Path;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Defaults for a conversion job, overridable per run from the command line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobConfig {
    /// Number of parallel workers (0 = one per logical core)
    #[serde(default)]
    pub workers: u32,
    /// Output format name (mp3, aac, ogg, opus, flac, alac, wav, aiff)
    #[serde(default = "default_format")]
    pub format: String,
    /// Quality tier name (low, medium, high); optional for wav and aiff
    #[serde(default = "default_quality")]
    pub quality: Option<String>,
    /// Output sample rate override in Hz
    #[serde(default)]
    pub sample_rate: Option<u32>,
    /// Output channel count override
    #[serde(default)]
    pub channels: Option<u16>,
}

fn default_format() -> String {
    "mp3".to_string()
}

fn default_quality() -> Option<String> {
    Some("medium".to_string())
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            format: default_format(),
            quality: default_quality(),
            sample_rate: None,
            channels: None,
        }
    }
}

/// Which source files are picked up by discovery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    /// Recognized lossless extensions, without the leading dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Match extensions exactly as written (default true)
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

/// Lossless extensions recognized out of the box.
pub const DEFAULT_EXTENSIONS: &[&str] = &["m4a", "flac", "dsf", "wav", "aif", "aiff"];

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_case_sensitive() -> bool {
    true
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            case_sensitive: default_case_sensitive(),
        }
    }
}

/// External encoder location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncoderConfig {
    /// ffmpeg binary name or path
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
        }
    }
}

/// Telemetry sampling and exposure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    /// Sampling period in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Address for the JSON telemetry endpoint, e.g. "127.0.0.1:7879"
    #[serde(default)]
    pub listen: Option<String>,
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            listen: None,
        }
    }
}

/// What to do once a job has completed
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PostJobConfig {
    /// Shell command to run after the job-complete event
    #[serde(default)]
    pub command: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub post_job: PostJobConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - FANOUT_WORKERS -> job.workers
    /// - FANOUT_FORMAT -> job.format
    /// - FANOUT_QUALITY -> job.quality
    /// - FANOUT_SAMPLE_RATE -> job.sample_rate
    /// - FANOUT_CHANNELS -> job.channels
    /// - FANOUT_FFMPEG -> encoder.ffmpeg
    /// - FANOUT_TELEMETRY_INTERVAL_MS -> telemetry.interval_ms
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("FANOUT_WORKERS") {
            if let Ok(workers) = val.parse::<u32>() {
                self.job.workers = workers;
            }
        }

        if let Ok(val) = env::var("FANOUT_FORMAT") {
            if !val.trim().is_empty() {
                self.job.format = val.trim().to_string();
            }
        }

        if let Ok(val) = env::var("FANOUT_QUALITY") {
            let val = val.trim();
            self.job.quality = if val.is_empty() {
                None
            } else {
                Some(val.to_string())
            };
        }

        if let Ok(val) = env::var("FANOUT_SAMPLE_RATE") {
            if let Ok(rate) = val.parse::<u32>() {
                self.job.sample_rate = Some(rate);
            }
        }

        if let Ok(val) = env::var("FANOUT_CHANNELS") {
            if let Ok(channels) = val.parse::<u16>() {
                self.job.channels = Some(channels);
            }
        }

        if let Ok(val) = env::var("FANOUT_FFMPEG") {
            if !val.trim().is_empty() {
                self.encoder.ffmpeg = val.trim().to_string();
            }
        }

        if let Ok(val) = env::var("FANOUT_TELEMETRY_INTERVAL_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.telemetry.interval_ms = ms;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = match Self::load_from_file(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        Ok(config)
    }
}
