//! # muxforge-av
//!
//! Media backends for muxforge.
//!
//! This crate provides:
//! - Probing media files for their video, audio and subtitle streams
//! - Running conversion plans through ffmpeg with streamed progress
//! - Relocating the MP4 `moov` index to the front of a file (faststart)
//! - Discovering the external tools the above depend on
//!
//! Each backend sits behind a trait ([`Prober`], [`TranscodeEngine`],
//! [`IndexRelocator`]) so callers can substitute their own.
//!
//! ## Features
//!
//! - `probe` (default) - ffprobe-backed probing
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use muxforge_av::probe;
//!
//! let media = probe("/path/to/video.mkv")?;
//! println!("Video codec: {}", media.video.codec);
//! # Ok::<(), muxforge_av::Error>(())
//! ```

mod error;
pub mod engine;
pub mod faststart;
pub mod plan;
pub mod probe;
pub mod tools;

// Re-exports
pub use engine::{FfmpegEngine, Progress, TranscodeEngine};
pub use error::{Error, Result};
pub use faststart::{FastStart, IndexRelocator};
pub use plan::{AudioSpec, Container, ConversionPlan, SubtitleSource, SubtitleSpec, VideoSpec};
pub use probe::{
    AudioStream, FfprobeProber, Format, ProbedMedia, Prober, SubtitleStream, VideoStream,
};
pub use tools::{ToolInfo, ToolRegistry};

/// Probe a media file with ffprobe from `PATH`.
pub fn probe<P: AsRef<std::path::Path>>(path: P) -> Result<ProbedMedia> {
    FfprobeProber::default().probe(path.as_ref())
}
