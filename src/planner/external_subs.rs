//! Sidecar subtitle discovery.
//!
//! A sidecar belongs to `movie.mkv` when it is named `movie.<lang>.<ext>`,
//! `<lang>` being a three letter language code and `<ext>` a subtitle
//! extension.

use crate::config::{Config, LanguagePolicy};
use muxforge_av::plan::{SubtitleSource, SubtitleSpec};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Finds sidecar subtitle files next to an input.
#[derive(Debug, Clone)]
pub struct ExternalSubtitleScanner<'a> {
    config: &'a Config,
    languages: LanguagePolicy,
}

/// A sidecar file and the language taken from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarMatch {
    pub path: PathBuf,
    pub language: String,
}

impl<'a> ExternalSubtitleScanner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            languages: config.subtitles.whitelist(),
        }
    }

    /// Subtitle specs for the sidecars of `basename` in `dir`.
    ///
    /// Engine input numbers count up from 1, one per accepted file; files
    /// are visited in file name order.
    pub fn scan(&self, dir: &Path, basename: &str) -> Vec<SubtitleSpec> {
        let mut specs = Vec::new();
        let mut input = 1u32;

        for found in self.find(dir, basename) {
            if !self.languages.allows(&found.language) {
                tracing::info!(
                    "Ignoring external subtitle {:?}: language {} not whitelisted",
                    found.path,
                    found.language
                );
                continue;
            }

            tracing::info!(
                "Importing external {} subtitle {:?}",
                found.language,
                found.path
            );
            specs.push(SubtitleSpec {
                source: SubtitleSource::External {
                    path: found.path,
                    input,
                },
                codec: self.config.subtitles.codec.clone(),
                language: found.language,
                forced: false,
                default: false,
            });
            input += 1;
        }

        specs
    }

    /// Every sidecar of `basename` in `dir`, regardless of language policy.
    pub fn find(&self, dir: &Path, basename: &str) -> Vec<SidecarMatch> {
        WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!("Error reading {:?}: {}", dir, err);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?;
                let language = self.match_sidecar(name, basename)?;
                Some(SidecarMatch {
                    path: entry.path().to_path_buf(),
                    language,
                })
            })
            .collect()
    }

    /// Language code if `file_name` is a sidecar of `basename`.
    fn match_sidecar(&self, file_name: &str, basename: &str) -> Option<String> {
        let (stem, ext) = file_name.rsplit_once('.')?;
        if !self.config.extensions.is_subtitle(ext) {
            return None;
        }

        let (base, language) = stem.rsplit_once('.')?;
        if base != basename
            || language.chars().count() != 3
            || !language.chars().all(|c| c.is_ascii_alphabetic())
        {
            return None;
        }

        Some(language.to_ascii_lowercase())
    }
}
