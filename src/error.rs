//! Error taxonomy for conversions.
//!
//! Each variant marks how far a conversion got and what is left on disk.
//! [`Error::Relocation`], [`Error::Cleanup`] and [`Error::Delete`] only
//! happen after the converted output exists; callers report them without
//! discarding the output.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while processing one input file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input does not exist or its extension is not accepted.
    #[error("Invalid source {}: {reason}", path.display())]
    InvalidSource {
        /// The rejected input path.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// Probing the input failed.
    #[error("Probe error: {0}")]
    Probe(#[source] muxforge_av::Error),

    /// The transcode engine failed; no output was kept.
    #[error("Conversion of {} failed: {source}", input.display())]
    Engine {
        /// The input that was being converted.
        input: PathBuf,
        /// The underlying engine error.
        #[source]
        source: muxforge_av::Error,
    },

    /// Index relocation failed; the unrelocated file is intact.
    #[error("Index relocation of {} failed: {source}", path.display())]
    Relocation {
        /// The file that was being relocated.
        path: PathBuf,
        /// The underlying relocator error.
        #[source]
        source: muxforge_av::Error,
    },

    /// A finished temp file could not replace its original.
    #[error("Could not replace {} with {}", original.display(), temp.display())]
    Cleanup {
        /// The file that should have been replaced.
        original: PathBuf,
        /// The finished file, still on disk.
        temp: PathBuf,
    },

    /// The source could not be deleted after a successful conversion.
    #[error("Could not delete {}", path.display())]
    Delete {
        /// The file that remains on disk.
        path: PathBuf,
    },

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration cannot drive a conversion.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an invalid source error.
    pub fn invalid_source(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the converted output is still usable despite this error.
    pub fn output_kept(&self) -> bool {
        matches!(
            self,
            Self::Relocation { .. } | Self::Cleanup { .. } | Self::Delete { .. }
        )
    }
}
