//! Conversion plan handed to a transcode engine.
//!
//! A plan is a fully resolved description of the output: which source streams
//! are mapped into which output slots and how each one is encoded. Slot order
//! is the order of the `audio` and `subtitle` vectors.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Codec name meaning "reuse the encoded stream unmodified".
pub const COPY: &str = "copy";

/// Output container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// MPEG-4 Part 14 container
    Mp4,
    /// Apple's MPEG-4 variant
    M4v,
    /// QuickTime container
    Mov,
    /// Matroska container
    Mkv,
}

impl Container {
    /// Get the file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::M4v => "m4v",
            Container::Mov => "mov",
            Container::Mkv => "mkv",
        }
    }

    /// Get the ffmpeg muxer name (`-f`) for this container.
    pub fn format_name(&self) -> &'static str {
        match self {
            Container::Mp4 | Container::M4v => "mp4",
            Container::Mov => "mov",
            Container::Mkv => "matroska",
        }
    }

    /// Whether the container stores an ISO-BMFF `moov` index.
    pub fn has_moov(&self) -> bool {
        !matches!(self, Container::Mkv)
    }
}

impl std::str::FromStr for Container {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_lowercase().as_str() {
            "mp4" => Ok(Container::Mp4),
            "m4v" => Ok(Container::M4v),
            "mov" | "quicktime" => Ok(Container::Mov),
            "mkv" | "matroska" => Ok(Container::Mkv),
            _ => Err(format!("Unknown container format: {}", s)),
        }
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Complete description of one conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionPlan {
    /// Output container.
    pub container: Container,
    /// Primary video stream.
    pub video: VideoSpec,
    /// Audio output slots, in order.
    pub audio: Vec<AudioSpec>,
    /// Subtitle output slots, in order.
    pub subtitle: Vec<SubtitleSpec>,
    /// Source duration, used to turn engine timestamps into percentages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_duration_secs: Option<f64>,
}

/// How the primary video stream is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSpec {
    /// Source stream index in the primary input.
    pub source_index: u32,
    /// Target codec, or [`COPY`].
    pub codec: String,
    /// Target bitrate in kbps.
    pub bitrate: Option<u64>,
}

/// How one audio output slot is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSpec {
    /// Source stream index in the primary input.
    pub source_index: u32,
    /// Target codec, or [`COPY`].
    pub codec: String,
    /// Output channel count.
    pub channels: u32,
    /// Target bitrate in kbps.
    pub bitrate: u32,
    /// ISO 639-2 language tag.
    pub language: String,
}

/// Where a subtitle output slot reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubtitleSource {
    /// A stream of the primary input.
    Stream { index: u32 },
    /// A sidecar file passed to the engine as an additional input.
    ///
    /// `input` is the engine input number; the primary input is 0, so
    /// external files are numbered from 1.
    External { path: PathBuf, input: u32 },
}

/// How one subtitle output slot is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleSpec {
    /// Stream or file the slot reads from.
    pub source: SubtitleSource,
    /// Target text subtitle codec.
    pub codec: String,
    /// ISO 639-2 language tag.
    pub language: String,
    /// Forced disposition flag.
    pub forced: bool,
    /// Default disposition flag.
    pub default: bool,
}

impl VideoSpec {
    /// Whether the stream is passed through without re-encoding.
    pub fn is_copy(&self) -> bool {
        self.codec == COPY
    }
}

impl AudioSpec {
    /// Whether the stream is passed through without re-encoding.
    pub fn is_copy(&self) -> bool {
        self.codec == COPY
    }
}

impl ConversionPlan {
    /// External subtitle files in engine input order.
    pub fn external_inputs(&self) -> impl Iterator<Item = (u32, &PathBuf)> {
        self.subtitle.iter().filter_map(|s| match &s.source {
            SubtitleSource::External { path, input } => Some((*input, path)),
            SubtitleSource::Stream { .. } => None,
        })
    }
}
