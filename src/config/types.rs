use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub subtitles: SubtitleConfig,

    #[serde(default)]
    pub extensions: ExtensionsConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Upper bound on a single conversion run (unbounded when unset)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ToolsConfig {
    /// Configured path override for a tool, if any.
    pub fn path_for(&self, tool: &str) -> Option<PathBuf> {
        match tool {
            "ffmpeg" => self.ffmpeg_path.clone(),
            "ffprobe" => self.ffprobe_path.clone(),
            _ => None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Delete the source once its conversion (or copy) is in place
    #[serde(default = "default_true")]
    pub delete_original: bool,

    #[serde(default = "default_output_extension")]
    pub output_extension: String,

    /// Write outputs here instead of next to the source
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Move the MP4 index to the front after conversion
    #[serde(default = "default_true")]
    pub relocate_moov: bool,

    /// Also process files that already have an output extension
    #[serde(default)]
    pub process_same_extensions: bool,

    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate ceiling in kbps (default: 256 per channel)
    #[serde(default)]
    pub audio_bitrate: Option<u32>,

    /// Add a stereo AAC track alongside multichannel audio
    #[serde(default)]
    pub ios_audio: bool,
}

fn default_true() -> bool {
    true
}

fn default_output_extension() -> String {
    "mp4".to_string()
}

fn default_video_codec() -> String {
    "h264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            delete_original: true,
            output_extension: default_output_extension(),
            output_dir: None,
            relocate_moov: true,
            process_same_extensions: false,
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            audio_bitrate: None,
            ios_audio: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Language whitelist (empty = any)
    #[serde(default)]
    pub languages: Vec<String>,

    /// Language assumed for untagged streams
    #[serde(default)]
    pub default_language: Option<String>,
}

impl AudioConfig {
    pub fn whitelist(&self) -> LanguagePolicy {
        LanguagePolicy::from_list(&self.languages)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubtitleConfig {
    /// Language whitelist (empty = any)
    #[serde(default)]
    pub languages: Vec<String>,

    /// Language assumed for untagged streams
    #[serde(default)]
    pub default_language: Option<String>,

    /// Text subtitle codec written to the output
    #[serde(default = "default_subtitle_codec")]
    pub codec: String,
}

fn default_subtitle_codec() -> String {
    "mov_text".to_string()
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            default_language: None,
            codec: default_subtitle_codec(),
        }
    }
}

impl SubtitleConfig {
    pub fn whitelist(&self) -> LanguagePolicy {
        LanguagePolicy::from_list(&self.languages)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtensionsConfig {
    #[serde(default = "default_input_extensions")]
    pub input: Vec<String>,

    #[serde(default = "default_output_extensions")]
    pub output: Vec<String>,

    #[serde(default = "default_subtitle_extensions")]
    pub subtitle: Vec<String>,

    /// Bitmap subtitle codecs that cannot become text subtitles
    #[serde(default = "default_image_subtitle_codecs")]
    pub image_subtitle_codecs: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_input_extensions() -> Vec<String> {
    strings(&["mkv", "avi", "ts", "mov", "vob", "mpg", "mts"])
}

fn default_output_extensions() -> Vec<String> {
    strings(&["mp4", "m4v"])
}

fn default_subtitle_extensions() -> Vec<String> {
    strings(&["srt", "vtt", "ass"])
}

fn default_image_subtitle_codecs() -> Vec<String> {
    strings(&[
        "pgssub",
        "dvdsub",
        "s_hdmv/pgs",
        "hdmv_pgs_subtitle",
        "dvd_subtitle",
        "dvb_subtitle",
    ])
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            input: default_input_extensions(),
            output: default_output_extensions(),
            subtitle: default_subtitle_extensions(),
            image_subtitle_codecs: default_image_subtitle_codecs(),
        }
    }
}

impl ExtensionsConfig {
    pub fn is_input(&self, ext: &str) -> bool {
        contains(&self.input, ext)
    }

    pub fn is_output(&self, ext: &str) -> bool {
        contains(&self.output, ext)
    }

    pub fn is_subtitle(&self, ext: &str) -> bool {
        contains(&self.subtitle, ext)
    }

    pub fn is_image_subtitle(&self, codec: &str) -> bool {
        contains(&self.image_subtitle_codecs, codec)
    }

    /// Whether files with this extension are accepted at all.
    pub fn is_known(&self, ext: &str) -> bool {
        self.is_input(ext) || self.is_output(ext)
    }
}

fn contains(list: &[String], value: &str) -> bool {
    list.iter().any(|v| v.eq_ignore_ascii_case(value))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Extra attempts after the first failed delete/rename
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,

    #[serde(default = "default_retry_delay")]
    pub delay_secs: u64,
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    10
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            delay_secs: default_retry_delay(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// Which language codes a stream may carry to be kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguagePolicy {
    /// No filtering.
    Any,
    /// Only these (lowercase) codes.
    Only(BTreeSet<String>),
}

impl LanguagePolicy {
    /// An empty list means no filtering.
    pub fn from_list(languages: &[String]) -> Self {
        if languages.is_empty() {
            Self::Any
        } else {
            Self::Only(languages.iter().map(|l| l.to_lowercase()).collect())
        }
    }

    pub fn allows(&self, language: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(set) => set.contains(&language.to_lowercase()),
        }
    }
}

impl Config {
    /// Lowercase language codes, codecs and extensions so later lookups can
    /// compare them directly.
    pub fn normalize(&mut self) {
        fn lower_all(list: &mut Vec<String>) {
            for item in list.iter_mut() {
                *item = item.trim().trim_start_matches('.').to_lowercase();
            }
        }
        fn lower_opt(value: &mut Option<String>) {
            if let Some(v) = value {
                *v = v.trim().to_lowercase();
            }
        }

        let c = &mut self.conversion;
        c.output_extension = c.output_extension.trim().trim_start_matches('.').to_lowercase();
        c.video_codec = c.video_codec.trim().to_lowercase();
        c.audio_codec = c.audio_codec.trim().to_lowercase();

        lower_all(&mut self.audio.languages);
        lower_opt(&mut self.audio.default_language);
        lower_all(&mut self.subtitles.languages);
        lower_opt(&mut self.subtitles.default_language);
        self.subtitles.codec = self.subtitles.codec.trim().to_lowercase();

        let e = &mut self.extensions;
        lower_all(&mut e.input);
        lower_all(&mut e.output);
        lower_all(&mut e.subtitle);
        lower_all(&mut e.image_subtitle_codecs);
    }
}
