//! Error types for muxforge-av.

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while probing, transcoding or relocating media.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// An external tool failed to execute.
    #[error("tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },

    /// An external tool ran longer than allowed and was killed.
    #[error("{tool} timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    /// Failed to parse tool output.
    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    /// The specified file was not found.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The probed file is missing something the caller needs.
    #[error("probe error: {0}")]
    Probe(String),

    /// Unsupported operation or format.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Invalid MP4 file structure.
    #[error("invalid MP4: {0}")]
    InvalidMp4(String),

    /// The moov atom already sits in front of the media data.
    #[error("moov atom already at the start of {}", path.display())]
    AlreadyAtFront { path: PathBuf },
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create an invalid MP4 error.
    pub fn invalid_mp4(msg: impl Into<String>) -> Self {
        Self::InvalidMp4(msg.into())
    }

    /// Whether this error only says the index needs no relocation.
    pub fn is_already_at_front(&self) -> bool {
        matches!(self, Self::AlreadyAtFront { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failed_display() {
        let err = Error::tool_failed("ffmpeg", "exit status 1");
        assert_eq!(err.to_string(), "tool execution failed: ffmpeg: exit status 1");
    }

    #[test]
    fn already_at_front_is_recognised() {
        let err = Error::AlreadyAtFront {
            path: PathBuf::from("/movies/a.mp4"),
        };
        assert!(err.is_already_at_front());
        assert!(!Error::invalid_mp4("no moov").is_already_at_front());
    }
}
