//! [`TranscodeEngine`] backed by the ffmpeg CLI.

use super::args::build_ffmpeg_args;
use super::progress::ProgressParser;
use super::{Progress, TranscodeEngine};
use crate::plan::ConversionPlan;
use crate::{Error, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Runs conversions through an ffmpeg executable.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    program: PathBuf,
}

impl FfmpegEngine {
    /// Create an engine that runs the given ffmpeg executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn convert<'a>(
        &'a self,
        input: &Path,
        output: &Path,
        plan: &ConversionPlan,
        timeout: Option<Duration>,
    ) -> Result<Progress<'a>> {
        if !input.is_file() {
            return Err(Error::file_not_found(input));
        }

        let args = build_ffmpeg_args(input, output, plan);

        #[cfg(feature = "tracing")]
        tracing::debug!("Running {:?} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found("ffmpeg")
                } else {
                    Error::Io(e)
                }
            })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::tool_failed("ffmpeg", "output pipes were not captured"));
            }
        };

        // Both pipes are drained from the start so a chatty ffmpeg never
        // blocks on a full pipe.
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });
        let stderr = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = BufReader::new(stderr).read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        });

        Ok(Box::new(FfmpegProgress {
            child: Some(child),
            lines,
            stderr: Some(stderr),
            parser: ProgressParser::new(plan.source_duration_secs),
            deadline: timeout.map(|t| (Instant::now() + t, t)),
            finished: false,
        }))
    }
}

/// Progress sequence of a running ffmpeg process.
///
/// Dropping the sequence before it ends kills the process.
pub struct FfmpegProgress {
    child: Option<Child>,
    lines: Receiver<std::io::Result<String>>,
    stderr: Option<JoinHandle<String>>,
    parser: ProgressParser,
    deadline: Option<(Instant, Duration)>,
    finished: bool,
}

impl FfmpegProgress {
    fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn fail(&mut self, err: Error) -> Option<Result<u8>> {
        self.kill();
        self.finished = true;
        Some(Err(err))
    }

    /// Next stdout line, or `Err(Timeout)` once the deadline passes.
    /// `Ok(None)` means stdout is closed.
    fn next_line(&self) -> Result<Option<std::io::Result<String>>> {
        match self.deadline {
            None => Ok(self.lines.recv().ok()),
            Some((deadline, timeout)) => {
                let left = deadline.saturating_duration_since(Instant::now());
                match self.lines.recv_timeout(left) {
                    Ok(line) => Ok(Some(line)),
                    Err(RecvTimeoutError::Disconnected) => Ok(None),
                    Err(RecvTimeoutError::Timeout) => Err(Error::Timeout {
                        tool: "ffmpeg".to_string(),
                        timeout,
                    }),
                }
            }
        }
    }

    /// Reap the process once its progress output has ended.
    fn finish(&mut self) -> Option<Result<u8>> {
        self.finished = true;
        let mut child = self.child.take()?;

        let status = child.wait();
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        match status {
            Ok(status) if status.success() => {
                if self.parser.last() == Some(100) {
                    None
                } else {
                    Some(Ok(100))
                }
            }
            Ok(status) => Some(Err(Error::tool_failed(
                "ffmpeg",
                format!("exited with status {}: {}", status, stderr.trim()),
            ))),
            Err(e) => Some(Err(Error::Io(e))),
        }
    }
}

impl Iterator for FfmpegProgress {
    type Item = Result<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.next_line() {
                Ok(Some(Ok(line))) => {
                    if let Some(pct) = self.parser.feed(&line) {
                        return Some(Ok(pct));
                    }
                }
                Ok(Some(Err(e))) => return self.fail(Error::Io(e)),
                Ok(None) => return self.finish(),
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("{}, killing ffmpeg", e);
                    return self.fail(e);
                }
            }
        }
    }
}

impl Drop for FfmpegProgress {
    fn drop(&mut self) {
        self.kill();
    }
}
