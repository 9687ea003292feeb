mod cli;

use muxforge::{
    batch, config,
    fsops::SafeFileOps,
    planner::OptionPlanner,
    relocate::{MoovRelocator, RelocateOutcome},
    Converter, Disposition,
};
use muxforge_av::{FastStart, Prober, ToolRegistry};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "muxforge=trace,muxforge_av=debug".to_string()
        } else {
            "muxforge=info,muxforge_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert { paths, no_progress } => {
            convert(&paths, cli.config.as_deref(), !no_progress)
        }
        Commands::Plan { file } => plan_file(&file, cli.config.as_deref()),
        Commands::Probe { file, json } => probe_file(&file, cli.config.as_deref(), json),
        Commands::Relocate { file } => relocate_file(&file, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("muxforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn tools(config: &config::Config) -> ToolRegistry {
    ToolRegistry::discover(|name| config.tools.path_for(name))
}

fn convert(paths: &[PathBuf], config_path: Option<&Path>, show_progress: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let registry = tools(&config);
    let prober = registry.prober().context("ffprobe is required for conversion")?;
    let engine = registry.engine().context("ffmpeg is required for conversion")?;

    let inputs = batch::collect_inputs(paths, &config.extensions);
    if inputs.is_empty() {
        anyhow::bail!("No media files found in {:?}", paths);
    }

    let converter = Converter::new(
        config,
        Arc::new(prober),
        Arc::new(engine),
        Arc::new(FastStart::new()),
    )?;

    let mut failed = 0usize;
    for input in &inputs {
        let result = converter.process(input, |pct| {
            if show_progress {
                draw_progress(pct);
            }
        });
        if show_progress {
            println!();
        }

        match result {
            Ok(result) => {
                let verb = match result.disposition {
                    Disposition::Converted => "Converted",
                    Disposition::Copied => "Copied",
                    Disposition::Unchanged => "Unchanged",
                };
                println!(
                    "✓ {} {} -> {}",
                    verb,
                    result.input.display(),
                    result.output.display()
                );
                if let (Some(w), Some(h)) = (result.width, result.height) {
                    println!("  {}x{}", w, h);
                }
                if result.input_deleted {
                    println!("  Original deleted");
                }
                for warning in &result.warnings {
                    println!("  ! {}", warning);
                }
            }
            Err(e) => {
                failed += 1;
                println!("✗ {}: {}", input.display(), e);
            }
        }
    }

    println!(
        "\n{} of {} files processed successfully",
        inputs.len() - failed,
        inputs.len()
    );

    if failed > 0 {
        anyhow::bail!("{} file(s) failed", failed);
    }
    Ok(())
}

/// `[#####     ] 50%`
fn draw_progress(pct: u8) {
    let filled = usize::from(pct.min(100) / 10);
    print!("\r[{}{}] {}%", "#".repeat(filled), " ".repeat(10 - filled), pct);
    let _ = std::io::stdout().flush();
}

fn plan_file(file: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let prober = tools(&config)
        .prober()
        .context("ffprobe is required for planning")?;
    let media = prober.probe(file)?;
    let plan = OptionPlanner::new(&config)?.plan(file, &media);

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn probe_file(file: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let prober = tools(&config)
        .prober()
        .context("ffprobe is required for probing")?;
    let media = prober.probe(file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&media)?);
        return Ok(());
    }

    println!("File: {}", media.file_path.display());
    if let Some(secs) = media.format.duration_secs {
        let secs = secs as u64;
        let mins = secs / 60;
        let hours = mins / 60;
        println!("Duration: {:02}:{:02}:{:02}", hours, mins % 60, secs % 60);
    }
    if let Some(bitrate) = media.format.bitrate {
        println!("Bitrate: {} kb/s", bitrate);
    }

    let video = &media.video;
    println!(
        "\nVideo: [{}] {} {}x{}",
        video.index, video.codec, video.width, video.height
    );

    println!("\nAudio Tracks: {}", media.audio.len());
    for track in &media.audio {
        println!(
            "  [{}] {} {}ch ({})",
            track.index, track.codec, track.channels, track.language
        );
    }

    println!("\nSubtitle Tracks: {}", media.subtitle.len());
    for track in &media.subtitle {
        print!("  [{}] {} ({})", track.index, track.codec, track.language);
        if track.forced {
            print!(" [forced]");
        }
        if track.default {
            print!(" [default]");
        }
        println!();
    }

    Ok(())
}

fn relocate_file(file: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let fsops = SafeFileOps::new();
    let relocator = FastStart::new();

    match MoovRelocator::new(&config, &relocator, &fsops).relocate(file)? {
        RelocateOutcome::Relocated(path) => println!("Relocated index of {}", path.display()),
        RelocateOutcome::Unchanged(path) => {
            println!("Index of {} is already at the front", path.display())
        }
        RelocateOutcome::NotApplicable => {
            anyhow::bail!("{:?} is not an existing MP4 output file", file)
        }
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    println!("Checking external tools...\n");

    let tools = tools(&config).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable conversion.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => match config::find_default_config() {
            Some(p) => {
                println!("Validating config: {:?}", p);
                let config = config::load_config(&p)?;
                println!("✓ Configuration is valid");
                config
            }
            None => {
                println!("No config file found, using defaults");
                config::load_config_or_default(None)?
            }
        },
    };

    let conv = &config.conversion;
    println!("  Output extension: {}", conv.output_extension);
    println!("  Video codec: {}", conv.video_codec);
    println!("  Audio codec: {}", conv.audio_codec);
    println!("  Delete originals: {}", conv.delete_original);
    println!("  Relocate MOOV: {}", conv.relocate_moov);
    match &conv.output_dir {
        Some(dir) => println!("  Output directory: {}", dir.display()),
        None => println!("  Output directory: next to source"),
    }
    let langs = |l: &[String]| {
        if l.is_empty() {
            "any".to_string()
        } else {
            l.join(", ")
        }
    };
    println!("  Audio languages: {}", langs(&config.audio.languages));
    println!("  Subtitle languages: {}", langs(&config.subtitles.languages));

    Ok(())
}
