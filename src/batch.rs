//! Expansion of command line paths into input files.

use crate::config::ExtensionsConfig;
use crate::processor::is_temp_file;
use crate::relocate::extension;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand `paths` into the files to process.
///
/// Files are kept as given (validation happens when they are processed).
/// Directories are walked recursively for files with an input or output
/// extension, skipping leftovers of interrupted runs.
pub fn collect_inputs(paths: &[PathBuf], extensions: &ExtensionsConfig) -> Vec<PathBuf> {
    let mut inputs = Vec::new();

    for path in paths {
        if path.is_dir() {
            let before = inputs.len();
            inputs.extend(scan_dir(path, extensions));
            tracing::info!(
                "Found {} media files in {:?}",
                inputs.len() - before,
                path
            );
        } else {
            inputs.push(path.clone());
        }
    }

    inputs
}

fn scan_dir(dir: &Path, extensions: &ExtensionsConfig) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            if is_temp_file(path) {
                tracing::debug!("Skipping temporary file {:?}", path);
                return false;
            }
            extension(path).is_some_and(|ext| extensions.is_known(&ext))
        })
        .collect()
}
