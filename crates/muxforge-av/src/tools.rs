//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the ffmpeg and
//! ffprobe executables and builds the engine and prober that use them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::engine::FfmpegEngine;
use crate::probe::FfprobeProber;
use crate::{Error, Result};

/// Known tool names that the registry manages.
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool locations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, PathBuf>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH`, preferring configured locations.
    ///
    /// `configured` returns the configured path for a tool name, if any. A
    /// configured path that does not exist falls back to a `PATH` lookup.
    /// Tools that are not found are omitted from the registry.
    pub fn discover<F>(configured: F) -> Self
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let resolved = match configured(name) {
                Some(p) if p.exists() => Some(p),
                Some(_p) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Configured {} path {:?} does not exist, searching PATH", name, _p);
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            if let Some(path) = resolved {
                tools.insert(name.to_string(), path);
            }
        }

        Self { tools }
    }

    /// Path of a discovered tool, or [`Error::ToolNotFound`].
    pub fn require(&self, name: &str) -> Result<&Path> {
        self.tools
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::tool_not_found(name))
    }

    /// Prober running the discovered ffprobe.
    pub fn prober(&self) -> Result<FfprobeProber> {
        Ok(FfprobeProber::new(self.require("ffprobe")?))
    }

    /// Engine running the discovered ffmpeg.
    pub fn engine(&self) -> Result<FfmpegEngine> {
        Ok(FfmpegEngine::new(self.require("ffmpeg")?))
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(path) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(path),
                    path: Some(path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("-version").output().ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
