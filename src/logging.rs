//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over the configured filter. With a logs folder
//! configured, output goes to one file per start date, otherwise to stderr so
//! stdout only carries report lines.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, LoggingConfig};
use crate::error::Result;

/// `dd.MM.yyyy.log`
pub fn log_file_name(date: NaiveDate) -> String {
    format!("{}.log", date.format("%d.%m.%Y"))
}

fn build_filter(configured: &str) -> std::result::Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(configured)
            .map_err(|e| ConfigError::invalid("logging.filter", e.to_string())),
    }
}

fn open_log_file(folder: &Path, date: NaiveDate) -> std::io::Result<(fs::File, PathBuf)> {
    fs::create_dir_all(folder)?;
    let path = folder.join(log_file_name(date));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

/// Install the global subscriber. Returns the log file path, if any.
pub fn init(config: &LoggingConfig, today: NaiveDate) -> Result<Option<PathBuf>> {
    let filter = build_filter(&config.filter)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &config.logs_folder {
        Some(folder) => {
            let (file, path) = open_log_file(folder, today)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            Ok(Some(path))
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            Ok(None)
        }
    }
}
