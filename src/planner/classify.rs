//! Per-stream keep/drop and transform decisions.

use crate::config::{Config, LanguagePolicy};
use muxforge_av::plan::{AudioSpec, SubtitleSource, SubtitleSpec, COPY};
use muxforge_av::probe::{AudioStream, SubtitleStream, UNDEFINED_LANGUAGE};

/// Default audio bitrate allowance per channel, in kbps.
pub const KBPS_PER_CHANNEL: u32 = 256;

/// Bitrate of the extra stereo track made for multichannel sources, in kbps.
pub const STEREO_COMPAT_BITRATE: u32 = 512;

/// Codec of the extra stereo track.
pub const STEREO_COMPAT_CODEC: &str = "aac";

/// Decides which probed streams make it into the output and how.
///
/// Holds no per-file state; one classifier can serve any number of files.
#[derive(Debug, Clone)]
pub struct StreamClassifier<'a> {
    config: &'a Config,
    audio_languages: LanguagePolicy,
    subtitle_languages: LanguagePolicy,
}

impl<'a> StreamClassifier<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            audio_languages: config.audio.whitelist(),
            subtitle_languages: config.subtitles.whitelist(),
        }
    }

    /// Output slots produced by one audio stream, in slot order.
    ///
    /// Empty when the stream is filtered out. A multichannel stream yields an
    /// extra stereo slot ahead of its main slot when stereo compatibility
    /// audio is enabled.
    pub fn classify_audio(&self, stream: &AudioStream) -> Vec<AudioSpec> {
        let conv = &self.config.conversion;
        let language = resolve_language(
            &stream.language,
            self.config.audio.default_language.as_deref(),
        );

        if !self.audio_languages.allows(&language) {
            tracing::info!(
                "Skipping audio stream {} ({}): language {} not whitelisted",
                stream.index,
                stream.codec,
                language
            );
            return Vec::new();
        }

        let mut specs = Vec::with_capacity(2);

        if conv.ios_audio && stream.channels > 2 {
            tracing::info!(
                "Adding stereo {} track for {}-channel audio stream {}",
                STEREO_COMPAT_CODEC,
                stream.channels,
                stream.index
            );
            specs.push(AudioSpec {
                source_index: stream.index,
                codec: STEREO_COMPAT_CODEC.to_string(),
                channels: 2,
                bitrate: conv
                    .audio_bitrate
                    .map_or(STEREO_COMPAT_BITRATE, |cap| cap.min(STEREO_COMPAT_BITRATE)),
                language: language.clone(),
            });
        }

        // Stereo sources get a single AAC track instead of two stereo tracks.
        let target = if conv.ios_audio && stream.channels == 2 {
            STEREO_COMPAT_CODEC
        } else {
            conv.audio_codec.as_str()
        };

        let codec = if stream.codec.eq_ignore_ascii_case(target) {
            tracing::info!(
                "Audio stream {} is already {}, copying",
                stream.index,
                stream.codec
            );
            COPY.to_string()
        } else {
            tracing::info!(
                "Audio stream {} ({} {}ch {}) will be encoded to {}",
                stream.index,
                stream.codec,
                stream.channels,
                language,
                target
            );
            target.to_string()
        };

        specs.push(AudioSpec {
            source_index: stream.index,
            codec,
            channels: stream.channels,
            bitrate: audio_bitrate(stream.channels, conv.audio_bitrate),
            language,
        });

        specs
    }

    /// Output slot for one subtitle stream, if it is kept.
    pub fn classify_subtitle(&self, stream: &SubtitleStream) -> Option<SubtitleSpec> {
        if self.config.extensions.is_image_subtitle(&stream.codec) {
            tracing::info!(
                "Skipping subtitle stream {}: {} is an image-based codec",
                stream.index,
                stream.codec
            );
            return None;
        }

        let language = resolve_language(
            &stream.language,
            self.config.subtitles.default_language.as_deref(),
        );

        if !self.subtitle_languages.allows(&language) {
            tracing::info!(
                "Skipping subtitle stream {} ({}): language {} not whitelisted",
                stream.index,
                stream.codec,
                language
            );
            return None;
        }

        tracing::info!(
            "Subtitle stream {} ({} {}) will be converted to {}",
            stream.index,
            stream.codec,
            language,
            self.config.subtitles.codec
        );

        Some(SubtitleSpec {
            source: SubtitleSource::Stream {
                index: stream.index,
            },
            codec: self.config.subtitles.codec.clone(),
            language,
            forced: stream.forced,
            default: stream.default,
        })
    }
}

/// `channels * 256` kbps, lowered to `ceiling` when that is smaller.
pub fn audio_bitrate(channels: u32, ceiling: Option<u32>) -> u32 {
    let allowance = channels.saturating_mul(KBPS_PER_CHANNEL);
    ceiling.map_or(allowance, |cap| cap.min(allowance))
}

fn resolve_language(language: &str, default: Option<&str>) -> String {
    match default {
        Some(default) if language.eq_ignore_ascii_case(UNDEFINED_LANGUAGE) => {
            tracing::info!("Undefined language, defaulting to {}", default);
            default.to_string()
        }
        _ => language.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(index: u32, codec: &str, language: &str, channels: u32) -> AudioStream {
        AudioStream {
            index,
            codec: codec.to_string(),
            language: language.to_string(),
            channels,
        }
    }

    fn subtitle(index: u32, codec: &str, language: &str) -> SubtitleStream {
        SubtitleStream {
            index,
            codec: codec.to_string(),
            language: language.to_string(),
            forced: false,
            default: true,
        }
    }

    #[test]
    fn bitrate_defaults_to_per_channel_allowance() {
        for channels in 1..=8 {
            assert_eq!(audio_bitrate(channels, None), 256 * channels);
        }
        assert_eq!(audio_bitrate(6, Some(640)), 640);
        assert_eq!(audio_bitrate(2, Some(640)), 512);
    }

    #[test]
    fn matching_codec_is_copied() {
        let config = Config::default();
        let specs = StreamClassifier::new(&config).classify_audio(&audio(1, "aac", "eng", 2));
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].codec, COPY);
        assert_eq!(specs[0].bitrate, 512);
    }

    #[test]
    fn undefined_language_takes_default_before_whitelist() {
        let mut config = Config::default();
        config.audio.languages = vec!["eng".to_string()];
        config.audio.default_language = Some("eng".to_string());
        let classifier = StreamClassifier::new(&config);

        let specs = classifier.classify_audio(&audio(1, "ac3", "und", 6));
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].language, "eng");
        assert_eq!(specs[0].codec, "aac");

        assert!(classifier.classify_audio(&audio(2, "ac3", "fre", 6)).is_empty());
    }

    #[test]
    fn ios_multichannel_gets_extra_stereo_track_first() {
        let mut config = Config::default();
        config.conversion.ios_audio = true;
        let specs = StreamClassifier::new(&config).classify_audio(&audio(1, "ac3", "eng", 6));

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].codec, "aac");
        assert_eq!(specs[0].channels, 2);
        assert_eq!(specs[0].bitrate, 512);
        assert_eq!(specs[1].channels, 6);
        assert_eq!(specs[1].bitrate, 1536);
        assert!(specs.iter().all(|s| s.source_index == 1));
    }

    #[test]
    fn ios_stereo_forces_aac() {
        let mut config = Config::default();
        config.conversion.ios_audio = true;
        config.conversion.audio_codec = "ac3".to_string();
        let classifier = StreamClassifier::new(&config);

        let specs = classifier.classify_audio(&audio(1, "dts", "eng", 2));
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].codec, "aac");

        let specs = classifier.classify_audio(&audio(2, "aac", "eng", 2));
        assert_eq!(specs[0].codec, COPY);
    }

    #[test]
    fn image_subtitles_are_always_dropped() {
        let mut config = Config::default();
        config.subtitles.languages = vec!["eng".to_string()];
        let classifier = StreamClassifier::new(&config);
        assert!(classifier
            .classify_subtitle(&subtitle(3, "hdmv_pgs_subtitle", "eng"))
            .is_none());

        let config = Config::default();
        let classifier = StreamClassifier::new(&config);
        assert!(classifier
            .classify_subtitle(&subtitle(3, "dvd_subtitle", "eng"))
            .is_none());
    }

    #[test]
    fn text_subtitle_is_converted_with_flags() {
        let mut config = Config::default();
        config.subtitles.default_language = Some("eng".to_string());
        let spec = StreamClassifier::new(&config)
            .classify_subtitle(&subtitle(4, "subrip", "und"))
            .unwrap();

        assert_eq!(spec.source, SubtitleSource::Stream { index: 4 });
        assert_eq!(spec.codec, "mov_text");
        assert_eq!(spec.language, "eng");
        assert!(spec.default);
        assert!(!spec.forced);
    }

    #[test]
    fn subtitle_whitelist_filters() {
        let mut config = Config::default();
        config.subtitles.languages = vec!["fre".to_string()];
        let classifier = StreamClassifier::new(&config);
        assert!(classifier.classify_subtitle(&subtitle(3, "ass", "eng")).is_none());
        assert!(classifier.classify_subtitle(&subtitle(4, "ass", "fre")).is_some());
    }
}
