//! ffmpeg command line construction.

use crate::plan::{ConversionPlan, SubtitleSource, SubtitleSpec};
use std::path::Path;

/// Build the ffmpeg argument vector (without the program name) for a plan.
///
/// The primary input is input 0; external subtitle files follow in their
/// plan-assigned input order.
pub fn build_ffmpeg_args(input: &Path, output: &Path, plan: &ConversionPlan) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-nostdin", "-v", "error", "-i"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.push(input.to_string_lossy().into_owned());

    let mut externals: Vec<_> = plan.external_inputs().collect();
    externals.sort_by_key(|(n, _)| *n);
    for (_, path) in externals {
        args.push("-i".to_string());
        args.push(path.to_string_lossy().into_owned());
    }

    // Video
    args.push("-map".to_string());
    args.push(format!("0:{}", plan.video.source_index));
    args.push("-c:v".to_string());
    args.push(plan.video.codec.clone());
    if !plan.video.is_copy() {
        if let Some(bitrate) = plan.video.bitrate {
            args.push("-b:v".to_string());
            args.push(format!("{}k", bitrate));
        }
    }

    // Audio
    for (slot, audio) in plan.audio.iter().enumerate() {
        args.push("-map".to_string());
        args.push(format!("0:{}", audio.source_index));
        args.push(format!("-c:a:{}", slot));
        args.push(audio.codec.clone());
        if !audio.is_copy() {
            args.push(format!("-b:a:{}", slot));
            args.push(format!("{}k", audio.bitrate));
            args.push(format!("-ac:a:{}", slot));
            args.push(audio.channels.to_string());
        }
        args.push(format!("-metadata:s:a:{}", slot));
        args.push(format!("language={}", audio.language));
    }

    // Subtitles
    for (slot, sub) in plan.subtitle.iter().enumerate() {
        args.push("-map".to_string());
        args.push(match &sub.source {
            SubtitleSource::Stream { index } => format!("0:{}", index),
            SubtitleSource::External { input, .. } => format!("{}:0", input),
        });
        args.push(format!("-c:s:{}", slot));
        args.push(sub.codec.clone());
        args.push(format!("-metadata:s:s:{}", slot));
        args.push(format!("language={}", sub.language));
        args.push(format!("-disposition:s:{}", slot));
        args.push(disposition(sub).to_string());
    }

    args.push("-f".to_string());
    args.push(plan.container.format_name().to_string());
    args.extend(["-progress", "pipe:1", "-nostats"].iter().map(|s| s.to_string()));
    args.push(output.to_string_lossy().into_owned());

    args
}

fn disposition(sub: &SubtitleSpec) -> &'static str {
    match (sub.default, sub.forced) {
        (true, true) => "default+forced",
        (true, false) => "default",
        (false, true) => "forced",
        (false, false) => "0",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{AudioSpec, Container, VideoSpec};
    use std::path::PathBuf;

    fn plan() -> ConversionPlan {
        ConversionPlan {
            container: Container::Mp4,
            video: VideoSpec {
                source_index: 0,
                codec: "h264".to_string(),
                bitrate: Some(8000),
            },
            audio: vec![
                AudioSpec {
                    source_index: 1,
                    codec: "aac".to_string(),
                    channels: 2,
                    bitrate: 512,
                    language: "eng".to_string(),
                },
                AudioSpec {
                    source_index: 1,
                    codec: "copy".to_string(),
                    channels: 6,
                    bitrate: 1536,
                    language: "eng".to_string(),
                },
            ],
            subtitle: vec![
                SubtitleSpec {
                    source: SubtitleSource::Stream { index: 3 },
                    codec: "mov_text".to_string(),
                    language: "fre".to_string(),
                    forced: true,
                    default: false,
                },
                SubtitleSpec {
                    source: SubtitleSource::External {
                        path: PathBuf::from("/m/movie.eng.srt"),
                        input: 1,
                    },
                    codec: "mov_text".to_string(),
                    language: "eng".to_string(),
                    forced: false,
                    default: false,
                },
            ],
            source_duration_secs: Some(60.0),
        }
    }

    fn window(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn test_inputs_in_order() {
        let args = build_ffmpeg_args(Path::new("/m/movie.mkv"), Path::new("/m/movie.mp4"), &plan());
        let inputs: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| args[i + 1].clone())
            .collect();
        assert_eq!(inputs, vec!["/m/movie.mkv", "/m/movie.eng.srt"]);
        assert_eq!(args.last().unwrap(), "/m/movie.mp4");
    }

    #[test]
    fn test_audio_slots() {
        let args = build_ffmpeg_args(Path::new("/m/a.mkv"), Path::new("/m/a.mp4"), &plan());
        assert_eq!(window(&args, "-c:a:0").as_deref(), Some("aac"));
        assert_eq!(window(&args, "-b:a:0").as_deref(), Some("512k"));
        assert_eq!(window(&args, "-ac:a:0").as_deref(), Some("2"));
        assert_eq!(window(&args, "-c:a:1").as_deref(), Some("copy"));
        // Copied streams keep their own bitrate and layout.
        assert!(window(&args, "-b:a:1").is_none());
        assert!(window(&args, "-ac:a:1").is_none());
    }

    #[test]
    fn test_subtitle_mapping_and_disposition() {
        let args = build_ffmpeg_args(Path::new("/m/a.mkv"), Path::new("/m/a.mp4"), &plan());
        let maps: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-map")
            .map(|(i, _)| args[i + 1].clone())
            .collect();
        assert_eq!(maps, vec!["0:0", "0:1", "0:1", "0:3", "1:0"]);
        assert_eq!(window(&args, "-disposition:s:0").as_deref(), Some("forced"));
        assert_eq!(window(&args, "-disposition:s:1").as_deref(), Some("0"));
        assert_eq!(window(&args, "-metadata:s:s:1").as_deref(), Some("language=eng"));
    }

    #[test]
    fn test_video_copy_has_no_bitrate() {
        let mut p = plan();
        p.video.codec = "copy".to_string();
        let args = build_ffmpeg_args(Path::new("/m/a.mkv"), Path::new("/m/a.mp4"), &p);
        assert_eq!(window(&args, "-c:v").as_deref(), Some("copy"));
        assert!(window(&args, "-b:v").is_none());
        assert_eq!(window(&args, "-f").as_deref(), Some("mp4"));
    }
}
