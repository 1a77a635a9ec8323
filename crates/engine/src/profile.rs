//! Encoding profiles: output format, quality tier and the codec parameter table.
//!
//! Every `(format, tier)` pair resolves to a concrete ffmpeg quality parameter.
//! The lookup is an exhaustive `match`, so the table cannot have holes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for profile construction and parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[error("Unknown quality tier: {0} (expected low, medium or high)")]
    UnknownTier(String),

    #[error("A quality tier is required for {0}")]
    MissingTier(OutputFormat),
}

/// Target format of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Mp3,
    Aac,
    OggVorbis,
    Opus,
    Flac,
    Alac,
    Wav,
    Aiff,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 8] = [
        OutputFormat::Mp3,
        OutputFormat::Aac,
        OutputFormat::OggVorbis,
        OutputFormat::Opus,
        OutputFormat::Flac,
        OutputFormat::Alac,
        OutputFormat::Wav,
        OutputFormat::Aiff,
    ];

    /// File extension of converted files, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Aac => "m4a",
            OutputFormat::OggVorbis => "ogg",
            OutputFormat::Opus => "opus",
            OutputFormat::Flac => "flac",
            OutputFormat::Alac => "m4a",
            OutputFormat::Wav => "wav",
            OutputFormat::Aiff => "aiff",
        }
    }

    /// ffmpeg audio codec name
    pub fn codec(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "libmp3lame",
            OutputFormat::Aac => "aac",
            OutputFormat::OggVorbis => "libvorbis",
            OutputFormat::Opus => "libopus",
            OutputFormat::Flac => "flac",
            OutputFormat::Alac => "alac",
            OutputFormat::Wav => "pcm_s16le",
            OutputFormat::Aiff => "pcm_s16be",
        }
    }

    /// ffmpeg option carrying the quality parameter, if the codec takes one
    pub fn quality_flag(&self) -> Option<&'static str> {
        match self {
            OutputFormat::Mp3 | OutputFormat::OggVorbis => Some("-q:a"),
            OutputFormat::Aac | OutputFormat::Opus => Some("-b:a"),
            OutputFormat::Flac | OutputFormat::Alac => Some("-compression_level"),
            OutputFormat::Wav | OutputFormat::Aiff => None,
        }
    }

    /// Uncompressed formats have a single tier and accept an unset one
    pub fn requires_tier(&self) -> bool {
        !matches!(self, OutputFormat::Wav | OutputFormat::Aiff)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "MP3",
            OutputFormat::Aac => "AAC",
            OutputFormat::OggVorbis => "Ogg Vorbis",
            OutputFormat::Opus => "Opus",
            OutputFormat::Flac => "FLAC",
            OutputFormat::Alac => "ALAC",
            OutputFormat::Wav => "WAV",
            OutputFormat::Aiff => "AIFF",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for OutputFormat {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Ok(OutputFormat::Mp3),
            "aac" => Ok(OutputFormat::Aac),
            "ogg" | "vorbis" | "ogg_vorbis" | "ogg-vorbis" => Ok(OutputFormat::OggVorbis),
            "opus" => Ok(OutputFormat::Opus),
            "flac" => Ok(OutputFormat::Flac),
            "alac" => Ok(OutputFormat::Alac),
            "wav" => Ok(OutputFormat::Wav),
            "aiff" | "aif" => Ok(OutputFormat::Aiff),
            _ => Err(ProfileError::UnknownFormat(s.to_string())),
        }
    }
}

/// Coarse user-facing quality setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [QualityTier::Low, QualityTier::Medium, QualityTier::High];
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityTier::Low => f.write_str("Low"),
            QualityTier::Medium => f.write_str("Medium"),
            QualityTier::High => f.write_str("High"),
        }
    }
}

impl FromStr for QualityTier {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(QualityTier::Low),
            "medium" | "med" => Ok(QualityTier::Medium),
            "high" => Ok(QualityTier::High),
            _ => Err(ProfileError::UnknownTier(s.to_string())),
        }
    }
}

/// Resolves the codec parameter and its description for a format and tier.
pub fn quality_param(format: OutputFormat, tier: QualityTier) -> (&'static str, &'static str) {
    use OutputFormat::*;
    use QualityTier::*;

    match (format, tier) {
        (Mp3, Low) => ("9", "VBR 45-85 kbit/s"),
        (Mp3, Medium) => ("5", "VBR 120-150 kbit/s"),
        (Mp3, High) => ("0", "VBR 220-260 kbit/s"),
        (Aac, Low) => ("64k", "CBR 64 kbit/s"),
        (Aac, Medium) => ("128k", "CBR 128 kbit/s"),
        (Aac, High) => ("256k", "CBR 256 kbit/s"),
        (OggVorbis, Low) => ("0", "VBR 64 kbit/s"),
        (OggVorbis, Medium) => ("5", "VBR 160 kbit/s"),
        (OggVorbis, High) => ("10", "VBR 500 kbit/s"),
        (Opus, Low) => ("32k", "CBR 32 kbit/s"),
        (Opus, Medium) => ("64k", "CBR 64 kbit/s"),
        (Opus, High) => ("128k", "CBR 128 kbit/s"),
        (Flac, Low) => ("0", "Compression Level: 0"),
        (Flac, Medium) => ("5", "Compression Level: 5"),
        (Flac, High) => ("12", "Compression Level: 12"),
        (Alac, Low) => ("0", "Compression Level: 0"),
        (Alac, Medium) => ("1", "Compression Level: 1"),
        (Alac, High) => ("2", "Compression Level: 2"),
        (Wav, _) | (Aiff, _) => ("0", "No Compression"),
    }
}

/// A resolved output format, tier and codec parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodingProfile {
    pub format: OutputFormat,
    pub tier: QualityTier,
    pub quality_param: &'static str,
}

impl EncodingProfile {
    /// Builds a profile, rejecting an unset tier for formats that need one.
    ///
    /// WAV and AIFF fall back to the `Low` tier, which carries no compression.
    pub fn new(format: OutputFormat, tier: Option<QualityTier>) -> Result<Self, ProfileError> {
        let tier = match tier {
            Some(tier) => tier,
            None if !format.requires_tier() => QualityTier::Low,
            None => return Err(ProfileError::MissingTier(format)),
        };
        let (quality_param, _) = quality_param(format, tier);
        Ok(Self {
            format,
            tier,
            quality_param,
        })
    }

    /// Parses format and optional tier names, as given in config or on the command line
    pub fn parse(format: &str, tier: Option<&str>) -> Result<Self, ProfileError> {
        let format = format.parse::<OutputFormat>()?;
        let tier = tier.map(str::parse::<QualityTier>).transpose()?;
        Self::new(format, tier)
    }

    pub fn description(&self) -> &'static str {
        quality_param(self.format, self.tier).1
    }
}

impl fmt::Display for EncodingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.format, self.tier, self.description())
    }
}
