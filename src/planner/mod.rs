//! Conversion planning.
//!
//! Turns probed stream metadata and the configured policy into a
//! [`ConversionPlan`]. Planning only reads the filesystem (to discover
//! sidecar subtitles).

mod classify;
mod external_subs;

pub use classify::{audio_bitrate, StreamClassifier, KBPS_PER_CHANNEL, STEREO_COMPAT_BITRATE};
pub use external_subs::{ExternalSubtitleScanner, SidecarMatch};

use crate::config::Config;
use crate::error::{Error, Result};
use muxforge_av::plan::{Container, ConversionPlan, VideoSpec, COPY};
use muxforge_av::probe::ProbedMedia;
use std::path::Path;

/// Builds conversion plans from probed media.
#[derive(Debug, Clone)]
pub struct OptionPlanner<'a> {
    config: &'a Config,
    container: Container,
    classifier: StreamClassifier<'a>,
    scanner: ExternalSubtitleScanner<'a>,
}

impl<'a> OptionPlanner<'a> {
    /// Fails with [`Error::Config`] when the output extension has no
    /// container format.
    pub fn new(config: &'a Config) -> Result<Self> {
        let container = config
            .conversion
            .output_extension
            .parse::<Container>()
            .map_err(Error::Config)?;

        Ok(Self {
            config,
            container,
            classifier: StreamClassifier::new(config),
            scanner: ExternalSubtitleScanner::new(config),
        })
    }

    /// Plan the conversion of `input`, described by `probed`.
    pub fn plan(&self, input: &Path, probed: &ProbedMedia) -> ConversionPlan {
        let target_video = &self.config.conversion.video_codec;
        tracing::info!("Video codec detected: {}", probed.video.codec);
        let video_codec = if probed.video.codec.eq_ignore_ascii_case(target_video) {
            tracing::info!("Video stream {} is already {}, copying", probed.video.index, target_video);
            COPY.to_string()
        } else {
            target_video.clone()
        };

        let audio = probed
            .audio
            .iter()
            .flat_map(|stream| self.classifier.classify_audio(stream))
            .collect();

        let mut subtitle: Vec<_> = probed
            .subtitle
            .iter()
            .filter_map(|stream| self.classifier.classify_subtitle(stream))
            .collect();

        if let (Some(dir), Some(basename)) = (
            input.parent(),
            input.file_stem().and_then(|s| s.to_str()),
        ) {
            let dir = if dir.as_os_str().is_empty() {
                Path::new(".")
            } else {
                dir
            };
            subtitle.extend(self.scanner.scan(dir, basename));
        }

        ConversionPlan {
            container: self.container,
            video: VideoSpec {
                source_index: probed.video.index,
                codec: video_codec,
                bitrate: probed.format.bitrate,
            },
            audio,
            subtitle,
            source_duration_secs: probed.format.duration_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muxforge_av::plan::SubtitleSource;
    use muxforge_av::probe::{AudioStream, Format, SubtitleStream, VideoStream};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn media(path: PathBuf) -> ProbedMedia {
        ProbedMedia {
            file_path: path,
            video: VideoStream {
                index: 0,
                codec: "hevc".to_string(),
                width: 1920,
                height: 1080,
            },
            audio: vec![
                AudioStream {
                    index: 1,
                    codec: "ac3".to_string(),
                    language: "jpn".to_string(),
                    channels: 6,
                },
                AudioStream {
                    index: 2,
                    codec: "aac".to_string(),
                    language: "eng".to_string(),
                    channels: 2,
                },
            ],
            subtitle: vec![
                SubtitleStream {
                    index: 3,
                    codec: "hdmv_pgs_subtitle".to_string(),
                    language: "eng".to_string(),
                    forced: false,
                    default: false,
                },
                SubtitleStream {
                    index: 4,
                    codec: "subrip".to_string(),
                    language: "eng".to_string(),
                    forced: true,
                    default: false,
                },
            ],
            format: Format {
                bitrate: Some(9000),
                duration_secs: Some(60.0),
            },
        }
    }

    #[test]
    fn plan_keeps_dense_slots_after_omissions() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("movie.mkv");
        std::fs::write(dir.path().join("movie.eng.srt"), b"").unwrap();

        let mut config = Config::default();
        config.audio.languages = vec!["eng".to_string()];
        let planner = OptionPlanner::new(&config).unwrap();
        let plan = planner.plan(&input, &media(input.clone()));

        assert_eq!(plan.container, Container::Mp4);
        assert_eq!(plan.video.codec, "h264");
        assert_eq!(plan.video.bitrate, Some(9000));
        assert_eq!(plan.source_duration_secs, Some(60.0));

        assert_eq!(plan.audio.len(), 1);
        assert_eq!(plan.audio[0].source_index, 2);
        assert_eq!(plan.audio[0].codec, COPY);

        assert_eq!(plan.subtitle.len(), 2);
        assert_eq!(plan.subtitle[0].source, SubtitleSource::Stream { index: 4 });
        assert!(plan.subtitle[0].forced);
        assert!(matches!(
            plan.subtitle[1].source,
            SubtitleSource::External { input: 1, .. }
        ));
    }

    #[test]
    fn matching_video_codec_is_copied() {
        let mut config = Config::default();
        config.conversion.video_codec = "hevc".to_string();
        let input = PathBuf::from("/nonexistent/movie.mkv");
        let plan = OptionPlanner::new(&config)
            .unwrap()
            .plan(&input, &media(input.clone()));
        assert!(plan.video.is_copy());
    }

    #[test]
    fn unknown_container_is_config_error() {
        let mut config = Config::default();
        config.conversion.output_extension = "avi".to_string();
        assert!(matches!(OptionPlanner::new(&config), Err(Error::Config(_))));
    }
}
