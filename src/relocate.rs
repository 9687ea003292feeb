//! Crash-safe index relocation of finished outputs.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fsops::{make_world_accessible, SafeFileOps};
use muxforge_av::IndexRelocator;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Suffix of the relocated copy written next to the original.
pub const RELOCATE_SUFFIX: &str = ".QTFS";

/// What [`MoovRelocator::relocate`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "path", rename_all = "snake_case")]
pub enum RelocateOutcome {
    /// The index was moved; the file at this path was replaced.
    Relocated(PathBuf),
    /// The index was already at the front; the file is untouched.
    Unchanged(PathBuf),
    /// Missing file or not an output container.
    NotApplicable,
}

impl RelocateOutcome {
    /// Path of the final file, if relocation applied.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Relocated(p) | Self::Unchanged(p) => Some(p),
            Self::NotApplicable => None,
        }
    }
}

/// Runs an [`IndexRelocator`] through a temp file and swaps the result in.
pub struct MoovRelocator<'a> {
    config: &'a Config,
    relocator: &'a dyn IndexRelocator,
    fsops: &'a SafeFileOps,
}

impl<'a> MoovRelocator<'a> {
    pub fn new(
        config: &'a Config,
        relocator: &'a dyn IndexRelocator,
        fsops: &'a SafeFileOps,
    ) -> Self {
        Self {
            config,
            relocator,
            fsops,
        }
    }

    /// Relocate the index of `path` in place.
    ///
    /// The relocated copy is written to `<path>.QTFS` and then moved over
    /// `path`. If that swap fails, [`Error::Cleanup`] is returned and the
    /// relocated copy stays on disk.
    pub fn relocate(&self, path: &Path) -> Result<RelocateOutcome> {
        let applicable = path.is_file()
            && extension(path).is_some_and(|ext| self.config.extensions.is_output(&ext));
        if !applicable {
            tracing::debug!("Skipping index relocation for {:?}", path);
            return Ok(RelocateOutcome::NotApplicable);
        }

        let temp = temp_path(path);
        // Leftover from an interrupted run.
        self.fsops.remove(&temp, 0, Duration::ZERO, None);

        tracing::info!("Relocating MOOV atom to start of file {:?}", path);
        match self.relocator.relocate(path, &temp) {
            Ok(()) => {}
            Err(e) if e.is_already_at_front() => {
                tracing::info!("MOOV atom already at start of {:?}", path);
                self.fsops.remove(&temp, 0, Duration::ZERO, None);
                return Ok(RelocateOutcome::Unchanged(path.to_path_buf()));
            }
            Err(e) => {
                self.fsops.remove(&temp, 0, Duration::ZERO, None);
                return Err(Error::Relocation {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        }

        if let Err(e) = make_world_accessible(&temp) {
            tracing::warn!("Unable to set permissions on {:?}: {}", temp, e);
        }

        let retry = &self.config.retry;
        if !self.fsops.replace(path, &temp, retry.attempts, retry.delay()) {
            tracing::error!("Unable to replace {:?} with relocated {:?}", path, temp);
            return Err(Error::Cleanup {
                original: path.to_path_buf(),
                temp,
            });
        }

        Ok(RelocateOutcome::Relocated(path.to_path_buf()))
    }
}

/// `<path>.QTFS`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(RELOCATE_SUFFIX);
    PathBuf::from(name)
}

pub(crate) fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
