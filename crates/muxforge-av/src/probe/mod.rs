//! Media file probing module.
//!
//! Probing is abstracted behind the [`Prober`] trait so the planner and the
//! conversion driver can be exercised without external tools. The default
//! implementation, [`FfprobeProber`], shells out to the ffprobe CLI.

mod ffprobe;
mod types;

pub use ffprobe::FfprobeProber;
pub use types::*;

use crate::Result;
use std::path::Path;

/// A media file prober capable of extracting stream metadata.
///
/// Implementations must be safe to share across threads (`Send + Sync`).
pub trait Prober: Send + Sync {
    /// Human-readable name identifying this prober implementation.
    fn name(&self) -> &'static str;

    /// Probe a media file and extract its stream metadata.
    ///
    /// Fails when the file cannot be read, is corrupt, or has no video stream.
    fn probe(&self, path: &Path) -> Result<ProbedMedia>;
}
