//! Unity Screenshot Tool
//!
//! Periodically captures the Unity editor window, but only while Unity is the
//! frontmost application, and writes timestamped images next to the
//! executable. Runs until interrupted with Ctrl-C.

mod capture;
mod config;
mod error;
mod logging;
mod paths;
mod poll;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::capture::{OsaScriptLocator, ScreencaptureSource};
use crate::config::{CaptureConfig, OutputFormat, Overrides};
use crate::poll::{stop_channel, PollLoop};

#[derive(Parser)]
#[command(name = "unity-screenshot")]
#[command(version)]
#[command(about = "Unity Screenshot Automation Tool")]
struct Cli {
    /// Screenshot interval in seconds (default: 5)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Screenshot image format (default: JPEG)
    #[arg(long, value_enum, ignore_case = true)]
    format: Option<OutputFormat>,

    /// Config file (default: config.json next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init()?;
    logging::install_panic_hook();

    let config_path = cli.config.unwrap_or_else(paths::get_config_path);
    let overrides = Overrides {
        interval_secs: cli.interval,
        format: cli.format,
    };
    let config = CaptureConfig::load(&config_path, overrides).context("Invalid configuration")?;

    log::info!("Screenshot interval set to {} seconds", config.interval_secs);
    log::info!("Screenshots will be saved to: {}", config.output_dir.display());
    log::info!("Image format set to: {}", config.format);
    log::info!("Target application: {}", config.target_app);

    let (stop_handle, stop_signal) = stop_channel();
    ctrlc::set_handler(move || stop_handle.request_stop())
        .context("Failed to install Ctrl-C handler")?;

    let mut poll = PollLoop::new(
        &config,
        OsaScriptLocator::new(),
        ScreencaptureSource::new(),
        stop_signal,
    );
    poll.run();

    Ok(())
}
