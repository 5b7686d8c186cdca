//! Measurement sources.
//!
//! A [`MeasurementSource`] performs one throughput measurement per call. The
//! production implementation is [`SpeedtestCli`], which drives the Ookla
//! `speedtest` command-line tool; tests substitute scripted sources.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::measurement::Measurement;

#[cfg(test)]
use mockall::automock;

pub mod speedtest;

pub use speedtest::{SpeedtestCli, SpeedtestSettings};

/// Failure of a single measurement attempt.
///
/// Always recoverable: the scheduler logs it and skips the cycle.
#[derive(Debug, Error)]
pub enum MeasurementError {
    #[error("failed to start measurement tool `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("measurement tool did not finish within {0:?}")]
    Timeout(Duration),
    #[error("measurement tool exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },
    #[error("measurement tool produced no output")]
    EmptyOutput,
    #[error("malformed measurement output: {0}")]
    Malformed(String),
    #[error("IO error while measuring: {0}")]
    Io(#[from] std::io::Error),
}

impl MeasurementError {
    pub(crate) fn malformed<S: Into<String>>(msg: S) -> Self {
        MeasurementError::Malformed(msg.into())
    }
}

/// Capability that takes one throughput measurement.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MeasurementSource: Send + Sync {
    /// Run one measurement. Never retries on its own.
    async fn measure(&self) -> Result<Measurement, MeasurementError>;
}
