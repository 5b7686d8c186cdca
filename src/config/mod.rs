//! Runtime configuration.
//!
//! Loaded from a JSON file with camelCase keys. Only the threshold, the
//! server id and the database path are required; everything else has a
//! default. A threshold of zero flags nothing. Validation happens once after loading and again after command
//! line overrides are applied, so an invalid value never reaches the
//! scheduler.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::SpeedtestSettings;

/// Config file looked up when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "speedwatch.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid<S: Into<String>>(key: &'static str, reason: S) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub mbits_threshold: u32,
    pub speedtest: SpeedtestConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_true")]
    pub color: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedtestConfig {
    pub server_id: u64,
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default)]
    pub logs_folder: Option<PathBuf>,
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            logs_folder: None,
            filter: default_filter(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_binary() -> PathBuf {
    PathBuf::from("speedtest")
}

fn default_timeout_secs() -> u64 {
    crate::source::speedtest::DEFAULT_TIMEOUT.as_secs()
}

fn default_filter() -> String {
    "info".to_string()
}

/// Values given on the command line; `None` keeps the file value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub mbits_threshold: Option<u32>,
    pub server_id: Option<u64>,
    pub storage_path: Option<PathBuf>,
    pub no_color: bool,
}

impl Config {
    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.speedtest.server_id == 0 {
            return Err(ConfigError::invalid("speedtest.serverId", "must be greater than zero"));
        }
        if self.speedtest.timeout_secs == 0 {
            return Err(ConfigError::invalid("speedtest.timeoutSecs", "must be greater than zero"));
        }
        if self.speedtest.binary.as_os_str().is_empty() {
            return Err(ConfigError::invalid("speedtest.binary", "must not be empty"));
        }
        if self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("storage.path", "must not be empty"));
        }
        Ok(())
    }

    /// Apply command line values and validate the result.
    pub fn apply_overrides(mut self, overrides: &Overrides) -> Result<Self, ConfigError> {
        if let Some(threshold) = overrides.mbits_threshold {
            self.mbits_threshold = threshold;
        }
        if let Some(server_id) = overrides.server_id {
            self.speedtest.server_id = server_id;
        }
        if let Some(path) = &overrides.storage_path {
            self.storage.path = path.clone();
        }
        if overrides.no_color {
            self.color = false;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn speedtest_settings(&self) -> SpeedtestSettings {
        SpeedtestSettings {
            binary: self.speedtest.binary.clone(),
            server_id: self.speedtest.server_id,
            timeout: Duration::from_secs(self.speedtest.timeout_secs),
            extra_args: self.speedtest.extra_args.clone(),
        }
    }
}
