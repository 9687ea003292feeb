//! Shared fixtures for integration tests.
//!
//! Provides mock [`Prober`], [`TranscodeEngine`] and [`IndexRelocator`]
//! implementations that work on real temp files without external tools, and
//! [`TestHarness`] which wires them into a [`Converter`].

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use muxforge::config::Config;
use muxforge::fsops::{SafeFileOps, Sleeper};
use muxforge::Converter;
use muxforge_av::{
    AudioStream, ConversionPlan, Format, IndexRelocator, ProbedMedia, Prober, Progress,
    SubtitleStream, TranscodeEngine, VideoStream,
};
use tempfile::TempDir;

/// A typical HEVC source with 5.1 AC3, stereo AAC and mixed subtitles.
pub fn sample_media(path: &Path) -> ProbedMedia {
    ProbedMedia {
        file_path: path.to_path_buf(),
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
                language: "eng".to_string(),
                channels: 6,
            },
            AudioStream {
                index: 2,
                codec: "aac".to_string(),
                language: "und".to_string(),
                channels: 2,
            },
        ],
        subtitle: vec![
            SubtitleStream {
                index: 3,
                codec: "hdmv_pgs_subtitle".to_string(),
                language: "eng".to_string(),
                forced: false,
                default: true,
            },
            SubtitleStream {
                index: 4,
                codec: "subrip".to_string(),
                language: "fre".to_string(),
                forced: true,
                default: false,
            },
        ],
        format: Format {
            bitrate: Some(8000),
            duration_secs: Some(120.0),
        },
    }
}

/// Prober returning [`sample_media`] for any existing file.
#[derive(Default)]
pub struct MockProber {
    pub fail: bool,
}

impl Prober for MockProber {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn probe(&self, path: &Path) -> muxforge_av::Result<ProbedMedia> {
        if self.fail {
            return Err(muxforge_av::Error::Probe("corrupt file".to_string()));
        }
        if !path.is_file() {
            return Err(muxforge_av::Error::file_not_found(path));
        }
        Ok(sample_media(path))
    }
}

/// How [`MockEngine`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Write the output and report 0, 50, 100.
    Succeed,
    /// Write a partial output, report 30, then fail.
    FailMidway,
    /// Report 100 without writing anything.
    NoOutput,
}

/// One recorded engine invocation.
#[derive(Debug, Clone)]
pub struct EngineCall {
    pub input: PathBuf,
    pub output: PathBuf,
    pub input_existed: bool,
    pub plan: ConversionPlan,
}

pub struct MockEngine {
    pub mode: EngineMode,
    pub calls: Mutex<Vec<EngineCall>>,
}

impl MockEngine {
    pub fn new(mode: EngineMode) -> Self {
        Self {
            mode,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl TranscodeEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn convert<'a>(
        &'a self,
        input: &Path,
        output: &Path,
        plan: &ConversionPlan,
        _timeout: Option<Duration>,
    ) -> muxforge_av::Result<Progress<'a>> {
        self.calls.lock().unwrap().push(EngineCall {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            input_existed: input.is_file(),
            plan: plan.clone(),
        });

        match self.mode {
            EngineMode::Succeed => {
                let mut data = b"converted:".to_vec();
                data.extend(fs::read(input)?);
                fs::write(output, data)?;
                Ok(Box::new(vec![Ok(0), Ok(50), Ok(100)].into_iter()))
            }
            EngineMode::FailMidway => {
                fs::write(output, b"partial")?;
                Ok(Box::new(
                    vec![
                        Ok(30),
                        Err(muxforge_av::Error::tool_failed("mock", "exit status 1")),
                    ]
                    .into_iter(),
                ))
            }
            EngineMode::NoOutput => Ok(Box::new(std::iter::once(Ok(100)))),
        }
    }
}

/// How [`MockRelocator`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocatorMode {
    Relocate,
    AlreadyAtFront,
    Fail,
    /// Write the relocated copy, then block the original from being
    /// replaced with a non-empty directory.
    LockOriginal,
}

pub struct MockRelocator {
    pub mode: RelocatorMode,
}

impl IndexRelocator for MockRelocator {
    fn relocate(&self, input: &Path, output: &Path) -> muxforge_av::Result<()> {
        match self.mode {
            RelocatorMode::Relocate => {
                let mut data = b"faststart:".to_vec();
                data.extend(fs::read(input)?);
                fs::write(output, data)?;
                Ok(())
            }
            RelocatorMode::AlreadyAtFront => Err(muxforge_av::Error::AlreadyAtFront {
                path: input.to_path_buf(),
            }),
            RelocatorMode::Fail => Err(muxforge_av::Error::invalid_mp4("no moov atom")),
            RelocatorMode::LockOriginal => {
                let mut data = b"faststart:".to_vec();
                data.extend(fs::read(input)?);
                fs::write(output, data)?;
                fs::remove_file(input)?;
                fs::create_dir(input)?;
                fs::write(input.join("open-handle"), b"")?;
                Ok(())
            }
        }
    }
}

/// Counts requested delays instead of sleeping.
#[derive(Default)]
pub struct NoSleep {
    pub calls: Mutex<Vec<Duration>>,
}

impl Sleeper for NoSleep {
    fn sleep(&self, duration: Duration) {
        self.calls.lock().unwrap().push(duration);
    }
}

/// Temp directory plus a converter wired to mocks.
pub struct TestHarness {
    pub dir: TempDir,
    pub engine: Arc<MockEngine>,
    pub converter: Converter,
}

impl TestHarness {
    pub fn new(config: Config) -> Self {
        Self::with_modes(config, EngineMode::Succeed, RelocatorMode::Relocate)
    }

    pub fn with_modes(config: Config, engine: EngineMode, relocator: RelocatorMode) -> Self {
        Self::build(config, MockProber::default(), engine, relocator)
    }

    pub fn build(
        config: Config,
        prober: MockProber,
        engine: EngineMode,
        relocator: RelocatorMode,
    ) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let engine = Arc::new(MockEngine::new(engine));
        let converter = Converter::new(
            config,
            Arc::new(prober),
            engine.clone(),
            Arc::new(MockRelocator { mode: relocator }),
        )
        .expect("valid config")
        .with_fsops(SafeFileOps::with_sleeper(Arc::new(NoSleep::default())));

        Self {
            dir,
            engine,
            converter,
        }
    }

    /// Create a file with `contents` in the harness directory.
    pub fn file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("failed to write fixture");
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
