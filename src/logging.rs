//! Tracing subscriber setup.
//!
//! Every command logs to stderr. With `logging.file = true` the same events
//! also go to `<log_dir>/<command>_<YYYYMMDD_HHMMSS>.log`, without ANSI
//! colors. `RUST_LOG` wins over the configured level; `--verbose` raises
//! the configured level to `debug`.

use crate::config::LoggingConfig;
use chrono::NaiveDateTime;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),
    #[error("Could not install logger: {0}")]
    Init(#[from] TryInitError),
}

/// Per-run log file for `command` started at `at`.
pub fn log_file_path(log_dir: &Path, command: &str, at: NaiveDateTime) -> PathBuf {
    log_dir.join(format!("{}_{}.log", command, at.format("%Y%m%d_%H%M%S")))
}

/// Filter from `RUST_LOG` if given, else from the configured level.
pub fn build_filter(rust_log: Option<&str>, level: &str, verbose: bool) -> Result<EnvFilter, ParseError> {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives),
        None if verbose => EnvFilter::try_new("debug"),
        None => EnvFilter::try_new(level),
    }
}

/// Install the global subscriber. Returns the log file path when one is written.
pub fn init(
    config: &LoggingConfig,
    log_dir: &Path,
    command: &str,
    verbose: bool,
    rust_log: Option<&str>,
    at: NaiveDateTime,
) -> Result<Option<PathBuf>, LoggingError> {
    let filter = build_filter(rust_log, &config.level, verbose)?;

    let (file_layer, file_path) = if config.file {
        fs::create_dir_all(log_dir)?;
        let path = log_file_path(log_dir, command, at);
        let file = File::create(&path)?;
        let layer = fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file));
        (Some(layer), Some(path))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(file_layer)
        .try_init()?;

    Ok(file_path)
}
