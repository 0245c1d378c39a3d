//! Capture configuration.
//!
//! Built once at startup from an optional config.json next to the
//! executable plus command-line overrides, then passed by reference to the
//! rest of the program. Nothing here changes after the loop starts.

use anyhow::{bail, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

/// Application whose window is captured unless config.json says otherwise.
pub const DEFAULT_TARGET_APP: &str = "Unity";

pub const DEFAULT_INTERVAL_SECS: u64 = 5;

pub const DEFAULT_FILE_PREFIX: &str = "unity_screenshot";

/// Image format of written screenshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, ValueEnum)]
pub enum OutputFormat {
    #[serde(rename = "PNG", alias = "png")]
    #[value(name = "PNG")]
    Png,
    #[serde(rename = "JPEG", alias = "jpeg", alias = "JPG", alias = "jpg")]
    #[value(name = "JPEG")]
    Jpeg,
}

impl OutputFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Png => write!(f, "PNG"),
            OutputFormat::Jpeg => write!(f, "JPEG"),
        }
    }
}

/// Complete, validated capture configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Process name that must be frontmost for a capture (exact match)
    pub target_app: String,
    /// Seconds between tick starts
    pub interval_secs: u64,
    /// Output image format
    pub format: OutputFormat,
    /// Directory screenshots are written to
    pub output_dir: PathBuf,
    /// Filename prefix before the timestamp
    pub file_prefix: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_app: DEFAULT_TARGET_APP.to_string(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            format: OutputFormat::Jpeg,
            output_dir: paths::get_screenshots_dir(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

/// Contents of config.json. Every field is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub target_app: Option<String>,
    pub interval_secs: Option<u64>,
    pub format: Option<OutputFormat>,
    /// Relative paths are resolved against the executable directory
    pub output_dir: Option<PathBuf>,
    pub file_prefix: Option<String>,
}

/// Values given on the command line. These win over config.json.
#[derive(Clone, Copy, Debug, Default)]
pub struct Overrides {
    pub interval_secs: Option<u64>,
    pub format: Option<OutputFormat>,
}

impl CaptureConfig {
    /// Loads config.json from `config_path` (if present) and applies `overrides`.
    pub fn load(config_path: &Path, overrides: Overrides) -> Result<Self> {
        let file = load_file_config(config_path);
        Self::from_parts(file, overrides, paths::get_exe_dir())
    }

    /// Merges defaults, file values and overrides, then validates.
    pub fn from_parts(file: FileConfig, overrides: Overrides, base_dir: &Path) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            target_app: file.target_app.unwrap_or(defaults.target_app),
            interval_secs: overrides
                .interval_secs
                .or(file.interval_secs)
                .unwrap_or(defaults.interval_secs),
            format: overrides
                .format
                .or(file.format)
                .unwrap_or(defaults.format),
            output_dir: file
                .output_dir
                .map(|dir| paths::resolve_against(base_dir, &dir))
                .unwrap_or(defaults.output_dir),
            file_prefix: file.file_prefix.unwrap_or(defaults.file_prefix),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("interval must be a positive number of seconds");
        }
        if self.target_app.trim().is_empty() {
            bail!("target_app must not be empty");
        }
        if self.file_prefix.is_empty() || self.file_prefix.contains(['/', '\\']) {
            bail!("file_prefix must be a non-empty name without path separators");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Reads config.json, falling back to defaults when it is missing or broken.
fn load_file_config(config_path: &Path) -> FileConfig {
    log::debug!("Looking for config at: {}", config_path.display());

    if !config_path.exists() {
        log::debug!("{} not found. Using default config.", config_path.display());
        return FileConfig::default();
    }

    match fs::read_to_string(config_path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                log::info!("Config loaded from {}", config_path.display());
                config
            }
            Err(e) => {
                log::warn!(
                    "Failed to parse {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                FileConfig::default()
            }
        },
        Err(e) => {
            log::warn!(
                "Failed to read {}: {}. Using defaults.",
                config_path.display(),
                e
            );
            FileConfig::default()
        }
    }
}
