//! Transcode engines.
//!
//! An engine takes a [`ConversionPlan`] and produces the output file, reporting
//! progress as a lazy, pull-based sequence of percentages. The caller drives
//! the conversion by iterating; the sequence ends when the engine is done.

mod args;
mod ffmpeg;
mod progress;

pub use args::build_ffmpeg_args;
pub use ffmpeg::{FfmpegEngine, FfmpegProgress};
pub use progress::ProgressParser;

use crate::plan::ConversionPlan;
use crate::Result;
use std::path::Path;
use std::time::Duration;

/// Lazy sequence of percent-complete values (0-100, non-decreasing).
///
/// An engine failure is yielded once as an `Err` item, after which the
/// sequence ends. The sequence is not restartable.
pub type Progress<'a> = Box<dyn Iterator<Item = Result<u8>> + 'a>;

/// Something that can carry out a [`ConversionPlan`].
pub trait TranscodeEngine: Send + Sync {
    /// Human-readable name identifying this engine.
    fn name(&self) -> &'static str;

    /// Start converting `input` into `output`.
    ///
    /// `timeout` bounds the total run time; `None` waits as long as the
    /// engine needs.
    fn convert<'a>(
        &'a self,
        input: &Path,
        output: &Path,
        plan: &ConversionPlan,
        timeout: Option<Duration>,
    ) -> Result<Progress<'a>>;
}
