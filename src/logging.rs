//! Logger setup.
//!
//! Every line goes to stdout and is appended to
//! `<exe_dir>/logs/unity_screenshot.log`.

use anyhow::Result;
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::paths;

const LOG_FILE_NAME: &str = "unity_screenshot.log";

/// Returns the log file path: `<exe_dir>/logs/unity_screenshot.log`
pub fn log_file_path() -> PathBuf {
    paths::get_logs_dir().join(LOG_FILE_NAME)
}

/// Writes to stdout and, if it could be opened, the log file.
struct TeeWriter {
    file: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            // A failing log file must not take console logging down with it
            if file.write_all(buf).is_err() {
                self.file = None;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
        Ok(())
    }
}

fn open_log_file(path: &Path) -> Option<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok()?;
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Installs the global logger. `RUST_LOG` overrides the default `info` level.
pub fn init() -> Result<()> {
    let file = open_log_file(&log_file_path());
    let file_missing = file.is_none();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let timestamp = Local::now().format("%H:%M:%S%.3f");
            if record.level() == log::Level::Info {
                writeln!(buf, "[{}] {}", timestamp, record.args())
            } else {
                writeln!(buf, "[{}] {}: {}", timestamp, record.level(), record.args())
            }
        })
        .target(env_logger::Target::Pipe(Box::new(TeeWriter { file })))
        .try_init()?;

    if file_missing {
        log::warn!(
            "Could not open {}; logging to console only",
            log_file_path().display()
        );
    }
    Ok(())
}

/// Logs panics with their location before the default hook runs.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        log::error!("[PANIC]{} {}", location, msg);
        default_hook(panic_info);
    }));
}
