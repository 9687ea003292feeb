//! FFprobe-based media probing.

use super::types::*;
use super::Prober;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    channels: Option<u32>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
    #[serde(default)]
    forced: u8,
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
}

/// [`Prober`] backed by the ffprobe CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    program: PathBuf,
}

impl FfprobeProber {
    /// Create a prober that runs the given ffprobe executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    fn probe(&self, path: &Path) -> Result<ProbedMedia> {
        if !path.is_file() {
            return Err(Error::file_not_found(path));
        }

        let output = Command::new(&self.program)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found("ffprobe")
                } else {
                    Error::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool_failed("ffprobe", stderr.trim().to_string()));
        }

        let json_str = String::from_utf8(output.stdout)
            .map_err(|e| Error::parse_error("ffprobe", format!("Invalid UTF-8: {}", e)))?;

        parse_ffprobe_json(path, &json_str)
    }
}

/// Parse the JSON document printed by `ffprobe -show_format -show_streams`.
pub(crate) fn parse_ffprobe_json(path: &Path, json: &str) -> Result<ProbedMedia> {
    let output: FfprobeOutput = serde_json::from_str(json)?;
    parse_ffprobe_output(path, output)
}

fn parse_ffprobe_output(path: &Path, output: FfprobeOutput) -> Result<ProbedMedia> {
    let format = Format {
        bitrate: output
            .format
            .bit_rate
            .and_then(|s| s.parse::<u64>().ok())
            .map(|bps| bps / 1000),
        duration_secs: output.format.duration.and_then(|s| s.parse::<f64>().ok()),
    };

    let mut video = None;
    let mut audio = Vec::new();
    let mut subtitle = Vec::new();

    for stream in output.streams {
        let language = stream
            .tags
            .language
            .map(|l| l.to_lowercase())
            .unwrap_or_else(|| UNDEFINED_LANGUAGE.to_string());

        match stream.codec_type.as_deref() {
            // Cover art is exposed as a video stream; it is never the primary video.
            Some("video") if video.is_none() && stream.disposition.attached_pic == 0 => {
                video = Some(VideoStream {
                    index: stream.index,
                    codec: stream.codec_name.unwrap_or_default(),
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                });
            }
            Some("audio") => audio.push(AudioStream {
                index: stream.index,
                codec: stream.codec_name.unwrap_or_default(),
                language,
                channels: stream.channels.unwrap_or(2),
            }),
            Some("subtitle") => subtitle.push(SubtitleStream {
                index: stream.index,
                codec: stream.codec_name.unwrap_or_default(),
                language,
                forced: stream.disposition.forced == 1,
                default: stream.disposition.default == 1,
            }),
            _ => {}
        }
    }

    let video = video.ok_or_else(|| {
        Error::Probe(format!("no video stream found in {}", path.display()))
    })?;

    Ok(ProbedMedia {
        file_path: path.to_path_buf(),
        video,
        audio,
        subtitle,
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "hevc", "width": 1920, "height": 1080,
             "disposition": {"default": 1, "forced": 0}},
            {"index": 1, "codec_type": "audio", "codec_name": "dts", "channels": 6,
             "tags": {"language": "ENG"}},
            {"index": 2, "codec_type": "audio", "codec_name": "aac", "channels": 2},
            {"index": 3, "codec_type": "subtitle", "codec_name": "subrip",
             "disposition": {"default": 0, "forced": 1}, "tags": {"language": "fre"}},
            {"index": 4, "codec_type": "attachment", "codec_name": "ttf"}
        ],
        "format": {"duration": "5400.250000", "bit_rate": "8000000"}
    }"#;

    #[test]
    fn test_parse_streams() {
        let media = parse_ffprobe_json(Path::new("/movies/movie.mkv"), SAMPLE).unwrap();

        assert_eq!(media.video.index, 0);
        assert_eq!(media.video.codec, "hevc");
        assert_eq!(media.dimensions(), (1920, 1080));

        assert_eq!(media.audio.len(), 2);
        assert_eq!(media.audio[0].index, 1);
        assert_eq!(media.audio[0].language, "eng");
        assert_eq!(media.audio[0].channels, 6);
        assert!(media.audio[1].is_undefined_language());

        assert_eq!(media.subtitle.len(), 1);
        assert_eq!(media.subtitle[0].index, 3);
        assert!(media.subtitle[0].forced);
        assert!(!media.subtitle[0].default);

        assert_eq!(media.format.bitrate, Some(8000));
        assert!((media.format.duration_secs.unwrap() - 5400.25).abs() < 0.001);
    }

    #[test]
    fn test_missing_video_is_probe_error() {
        let json = r#"{"streams": [{"index": 0, "codec_type": "audio", "codec_name": "flac"}],
                       "format": {}}"#;
        let err = parse_ffprobe_json(Path::new("/music/a.mka"), json).unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
    }

    #[test]
    fn test_cover_art_is_not_primary_video() {
        let json = r#"{"streams": [
            {"index": 0, "codec_type": "video", "codec_name": "mjpeg", "width": 600, "height": 600,
             "disposition": {"attached_pic": 1}},
            {"index": 1, "codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720}
        ], "format": {}}"#;
        let media = parse_ffprobe_json(Path::new("/movies/a.mkv"), json).unwrap();
        assert_eq!(media.video.index, 1);
        assert_eq!(media.video.codec, "h264");
    }

    #[test]
    fn test_invalid_json() {
        assert!(parse_ffprobe_json(Path::new("/x.mkv"), "not json").is_err());
    }
}
