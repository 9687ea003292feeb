use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "muxforge")]
#[command(author, version, about = "Convert media containers to MP4")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert files, or every media file under directories
    Convert {
        /// Files or directories to convert
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Do not draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Show the conversion plan for a file without converting
    Plan {
        /// File to plan
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Probe a media file and display its streams
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move the MP4 index of a file to the front
    Relocate {
        /// MP4 file to rewrite
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
