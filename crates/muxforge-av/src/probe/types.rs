//! Probed stream metadata.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Language tag used by containers for untagged streams.
pub const UNDEFINED_LANGUAGE: &str = "und";

/// Stream metadata extracted from one media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbedMedia {
    /// Path to the probed file.
    pub file_path: PathBuf,
    /// Primary video stream.
    pub video: VideoStream,
    /// Audio streams in container order.
    pub audio: Vec<AudioStream>,
    /// Subtitle streams in container order.
    pub subtitle: Vec<SubtitleStream>,
    /// Container-level information.
    pub format: Format,
}

/// Information about the primary video stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStream {
    /// Absolute stream index within the container.
    pub index: u32,
    /// Codec name as reported by ffprobe (e.g. "h264", "hevc").
    pub codec: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Information about an audio stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioStream {
    /// Absolute stream index within the container.
    pub index: u32,
    /// Codec name (e.g. "aac", "ac3", "dts").
    pub codec: String,
    /// ISO 639-2 language code, `und` when untagged.
    pub language: String,
    /// Number of channels.
    pub channels: u32,
}

/// Information about a subtitle stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleStream {
    /// Absolute stream index within the container.
    pub index: u32,
    /// Subtitle codec (e.g. "subrip", "ass", "hdmv_pgs_subtitle").
    pub codec: String,
    /// ISO 639-2 language code, `und` when untagged.
    pub language: String,
    /// Whether this is a forced track.
    pub forced: bool,
    /// Whether this is the default track.
    pub default: bool,
}

/// Container-level information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Format {
    /// Overall bitrate in kbps.
    pub bitrate: Option<u64>,
    /// Duration in seconds.
    pub duration_secs: Option<f64>,
}

impl ProbedMedia {
    /// Video dimensions as `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.video.width, self.video.height)
    }
}

impl AudioStream {
    /// Whether the container left the language untagged.
    pub fn is_undefined_language(&self) -> bool {
        self.language == UNDEFINED_LANGUAGE
    }
}

impl SubtitleStream {
    /// Whether the container left the language untagged.
    pub fn is_undefined_language(&self) -> bool {
        self.language == UNDEFINED_LANGUAGE
    }
}
