//! Per-file conversion driver.
//!
//! [`Converter::process`] takes one input through validation, planning, the
//! transcode engine, optional index relocation and source deletion. The
//! source is only deleted once a non-empty output exists on disk, and an
//! engine failure puts a renamed source back where it was.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fsops::{make_world_accessible, SafeFileOps};
use crate::planner::OptionPlanner;
use crate::relocate::{extension, MoovRelocator, RelocateOutcome};
use muxforge_av::{ConversionPlan, IndexRelocator, Prober, TranscodeEngine};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// What happened to an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Converted by the transcode engine.
    Converted,
    /// Already in the output format; copied to the output directory.
    Copied,
    /// Already in the output format; nothing to do.
    Unchanged,
}

/// Outcome of processing one input file.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub input: PathBuf,
    pub output: PathBuf,
    pub disposition: Disposition,
    /// Plan handed to the engine; `None` unless converted.
    pub plan: Option<ConversionPlan>,
    pub input_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relocation: Option<RelocateOutcome>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Non-fatal problems (failed deletion, relocation, permissions).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ConversionResult {
    fn new(input: &Path, output: PathBuf, disposition: Disposition) -> Self {
        Self {
            input: input.to_path_buf(),
            output,
            disposition,
            plan: None,
            input_deleted: false,
            relocation: None,
            width: None,
            height: None,
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Converts files according to one configuration.
///
/// Holds no per-file state, so one converter may be shared by several
/// threads each processing its own files.
pub struct Converter {
    config: Config,
    prober: Arc<dyn Prober>,
    engine: Arc<dyn TranscodeEngine>,
    relocator: Arc<dyn IndexRelocator>,
    fsops: SafeFileOps,
}

impl Converter {
    /// Fails with [`Error::Config`] when the configuration cannot drive a
    /// conversion.
    pub fn new(
        config: Config,
        prober: Arc<dyn Prober>,
        engine: Arc<dyn TranscodeEngine>,
        relocator: Arc<dyn IndexRelocator>,
    ) -> Result<Self> {
        OptionPlanner::new(&config)?;
        tracing::debug!(
            "Converter using {} prober and {} engine",
            prober.name(),
            engine.name()
        );

        Ok(Self {
            config,
            prober,
            engine,
            relocator,
            fsops: SafeFileOps::new(),
        })
    }

    /// Replace the filesystem helper (e.g. to avoid real retry delays).
    pub fn with_fsops(mut self, fsops: SafeFileOps) -> Self {
        self.fsops = fsops;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether `path` has an extension this converter accepts at all.
    pub fn is_valid_source(&self, path: &Path) -> bool {
        extension(path).is_some_and(|ext| self.config.extensions.is_known(&ext))
    }

    /// Whether `path` should go through the transcode engine.
    pub fn needs_conversion(&self, path: &Path) -> bool {
        let Some(ext) = extension(path) else {
            return false;
        };
        let conv = &self.config.conversion;
        let exts = &self.config.extensions;

        (exts.is_input(&ext) || (conv.process_same_extensions && exts.is_output(&ext)))
            && exts.is_output(&conv.output_extension)
    }

    /// Probe `input` and compute its conversion plan without converting.
    pub fn plan(&self, input: &Path) -> Result<ConversionPlan> {
        self.validate(input)?;
        let probed = self.prober.probe(input).map_err(Error::Probe)?;
        Ok(OptionPlanner::new(&self.config)?.plan(input, &probed))
    }

    /// Relocate the index of an existing output file.
    pub fn relocate(&self, path: &Path) -> Result<RelocateOutcome> {
        MoovRelocator::new(&self.config, self.relocator.as_ref(), &self.fsops).relocate(path)
    }

    /// Process one input file, reporting engine progress to `on_progress`.
    pub fn process<F>(&self, input: &Path, mut on_progress: F) -> Result<ConversionResult>
    where
        F: FnMut(u8),
    {
        self.validate(input)?;
        tracing::info!("Processing {:?}", input);

        let mut result = if self.needs_conversion(input) {
            self.convert(input, &mut on_progress)?
        } else {
            self.copy_only(input)
        };

        match self.prober.probe(&result.output) {
            Ok(media) => {
                result.width = Some(media.video.width);
                result.height = Some(media.video.height);
            }
            Err(e) => {
                tracing::warn!("Unable to read dimensions of {:?}: {}", result.output, e);
            }
        }

        Ok(result)
    }

    fn validate(&self, input: &Path) -> Result<()> {
        if !input.is_file() {
            return Err(Error::invalid_source(input, "file does not exist"));
        }
        if !self.is_valid_source(input) {
            return Err(Error::invalid_source(input, "unrecognized extension"));
        }
        Ok(())
    }

    /// Inputs already in an output format: copy to the output directory if
    /// one is configured, otherwise leave alone.
    fn copy_only(&self, input: &Path) -> ConversionResult {
        let Some(dir) = &self.config.conversion.output_dir else {
            tracing::info!("{:?} does not need conversion", input);
            return ConversionResult::new(input, input.to_path_buf(), Disposition::Unchanged);
        };

        let Some(file_name) = input.file_name() else {
            return ConversionResult::new(input, input.to_path_buf(), Disposition::Unchanged);
        };
        let dest = dir.join(file_name);

        if same_file(input, &dest) {
            tracing::info!("{:?} is already in the output directory", input);
            return ConversionResult::new(input, dest, Disposition::Unchanged);
        }

        tracing::info!("Copying {:?} to {:?}", input, dest);
        match fs::copy(input, &dest) {
            Ok(_) => {
                let mut result = ConversionResult::new(input, dest, Disposition::Copied);
                if self.config.conversion.delete_original {
                    self.delete_source(input, &mut result);
                }
                result
            }
            Err(e) => {
                let mut result =
                    ConversionResult::new(input, input.to_path_buf(), Disposition::Unchanged);
                result.warn(format!("Unable to copy {:?} to {:?}: {}", input, dest, e));
                result
            }
        }
    }

    fn convert<F>(&self, input: &Path, on_progress: &mut F) -> Result<ConversionResult>
    where
        F: FnMut(u8),
    {
        let probed = self.prober.probe(input).map_err(Error::Probe)?;
        let plan = OptionPlanner::new(&self.config)?.plan(input, &probed);

        let (dir, stem) = self.output_location(input)?;
        let ext = &self.config.conversion.output_extension;
        let mut output = dir.join(format!("{}.{}", stem, ext));

        // The engine must never write over the file it is reading.
        let mut source = input.to_path_buf();
        let mut renamed = false;
        if output == input || same_file(&output, input) {
            let temp = temp_input_path(input);
            self.fsops.remove(&temp, 0, Duration::ZERO, None);
            match fs::rename(input, &temp) {
                Ok(()) => {
                    tracing::debug!("Renamed {:?} to {:?}", input, temp);
                    source = temp;
                    renamed = true;
                }
                Err(e) => {
                    tracing::warn!("Unable to rename {:?}: {}", input, e);
                    output = collision_free(&dir, &stem, ext);
                }
            }
        }

        tracing::info!("Converting {:?} to {:?}", source, output);
        if let Err(source_err) = self.run_engine(&source, &output, &plan, on_progress) {
            self.restore(input, &source, &output, renamed);
            return Err(Error::Engine {
                input: input.to_path_buf(),
                source: source_err,
            });
        }

        let mut result = ConversionResult::new(input, output.clone(), Disposition::Converted);
        result.plan = Some(plan);

        if let Err(e) = make_world_accessible(&output) {
            result.warn(format!("Unable to set permissions on {:?}: {}", output, e));
        }

        if self.config.conversion.relocate_moov {
            match self.relocate(&output) {
                Ok(outcome) => result.relocation = Some(outcome),
                Err(Error::Cleanup { original, temp }) => {
                    result.output = surviving_output(&original, &temp);
                    result.warn(Error::Cleanup { original, temp }.to_string());
                }
                Err(e) => result.warn(e.to_string()),
            }
        }

        if self.config.conversion.delete_original {
            self.delete_source(&source, &mut result);
        } else if renamed {
            tracing::info!("Original kept as {:?}", source);
        }

        tracing::info!("{:?} created", result.output);
        Ok(result)
    }

    fn run_engine<F>(
        &self,
        source: &Path,
        output: &Path,
        plan: &ConversionPlan,
        on_progress: &mut F,
    ) -> muxforge_av::Result<()>
    where
        F: FnMut(u8),
    {
        let progress = self
            .engine
            .convert(source, output, plan, self.config.tools.timeout())?;
        for pct in progress {
            on_progress(pct?);
        }

        match fs::metadata(output) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(muxforge_av::Error::tool_failed(
                self.engine.name(),
                format!("no output written to {}", output.display()),
            )),
        }
    }

    /// Undo a failed conversion: drop partial output, put the source back.
    fn restore(&self, input: &Path, source: &Path, output: &Path, renamed: bool) {
        if output != source {
            self.fsops.remove(output, 0, Duration::ZERO, None);
        }
        if renamed {
            match fs::rename(source, input) {
                Ok(()) => tracing::debug!("Restored {:?}", input),
                Err(e) => tracing::error!("Unable to restore {:?} from {:?}: {}", input, source, e),
            }
        }
    }

    fn delete_source(&self, source: &Path, result: &mut ConversionResult) {
        let retry = &self.config.retry;
        if self.fsops.remove(source, retry.attempts, retry.delay(), None) {
            tracing::info!("{:?} deleted", source);
            result.input_deleted = true;
        } else {
            result.warn(
                Error::Delete {
                    path: source.to_path_buf(),
                }
                .to_string(),
            );
        }
    }

    fn output_location(&self, input: &Path) -> Result<(PathBuf, String)> {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::invalid_source(input, "file name is not valid UTF-8"))?;

        let dir = match &self.config.conversion.output_dir {
            Some(dir) => dir.clone(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };

        Ok((dir, stem.to_string()))
    }
}

/// `<dir>/<stem>.tmp.<ext>` next to the input.
pub fn temp_input_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let name = match input.extension() {
        Some(ext) => format!("{}.tmp.{}", stem, ext.to_string_lossy()),
        None => format!("{}.tmp", stem),
    };
    input.with_file_name(name)
}

/// Whether `path` is one of this tool's own temporary files.
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    name.ends_with(crate::relocate::RELOCATE_SUFFIX)
        || path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| stem.ends_with(".tmp"))
}

/// First of `<stem>(1).<ext>`, `<stem>(2).<ext>`, ... that does not exist.
pub fn collision_free(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let mut i = 1u32;
    loop {
        let candidate = dir.join(format!("{}({}).{}", stem, i, ext));
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}

/// Where the finished output lives after a failed relocation swap.
///
/// The relocated temp copy takes over once the original is gone.
pub fn surviving_output(original: &Path, temp: &Path) -> PathBuf {
    if !original.exists() && temp.exists() {
        temp.to_path_buf()
    } else {
        original.to_path_buf()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
