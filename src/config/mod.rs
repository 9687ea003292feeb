mod types;

pub use types::*;

use anyhow::{Context, Result};
use muxforge_av::Container;
use std::path::{Path, PathBuf};

/// Default config locations, searched in order.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./muxforge.toml",
    "./config.toml",
    "~/.config/muxforge/config.toml",
    "/etc/muxforge/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    tracing::debug!("Loaded config from {:?}", path);
    Ok(config)
}

/// Parse, normalize and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Failed to parse config")?;
    config.normalize();
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    if let Some(path) = find_default_config() {
        return load_config(&path);
    }

    tracing::debug!("No config file found, using defaults");
    let mut config = Config::default();
    config.normalize();
    Ok(config)
}

/// First existing file among [`DEFAULT_CONFIG_PATHS`].
pub fn find_default_config() -> Option<PathBuf> {
    DEFAULT_CONFIG_PATHS.iter().find_map(|path_str| {
        let path = PathBuf::from(shellexpand::tilde(path_str).as_ref());
        path.exists().then_some(path)
    })
}

/// Validate configuration
///
/// Problems that would make every conversion wrong are errors; the rest are
/// logged as warnings.
pub fn validate_config(config: &Config) -> Result<()> {
    let conv = &config.conversion;
    let ext = &config.extensions;

    if !ext.is_output(&conv.output_extension) {
        anyhow::bail!(
            "Output extension '{}' is not one of the valid output extensions {:?}",
            conv.output_extension,
            ext.output
        );
    }

    if conv.output_extension.parse::<Container>().is_err() {
        anyhow::bail!(
            "Output extension '{}' has no known container format",
            conv.output_extension
        );
    }

    if ext.is_image_subtitle(&config.subtitles.codec) {
        anyhow::bail!(
            "Subtitle codec '{}' is listed as an image subtitle codec",
            config.subtitles.codec
        );
    }

    if let Some(dir) = &conv.output_dir {
        if !dir.is_dir() {
            tracing::warn!("Output directory does not exist: {:?}", dir);
        }
    }

    for (name, path) in [
        ("ffmpeg", &config.tools.ffmpeg_path),
        ("ffprobe", &config.tools.ffprobe_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("Configured {} path does not exist: {:?}", name, path);
            }
        }
    }

    if config.tools.timeout_secs == Some(0) {
        tracing::warn!("tools.timeout_secs is 0; every conversion will time out");
    }

    Ok(())
}
