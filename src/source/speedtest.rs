//! Ookla `speedtest` CLI driver.
//!
//! The tool is invoked with JSON output enabled and prints one JSON document
//! per line. Only the last non-blank line is the result; anything before it
//! is progress or log noise.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{MeasurementError, MeasurementSource};
use crate::clock::{Clock, SystemClock};
use crate::measurement::Measurement;

/// Default upper bound for one run of the tool.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// How to invoke the measurement tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedtestSettings {
    pub binary: PathBuf,
    pub server_id: u64,
    pub timeout: Duration,
    pub extra_args: Vec<String>,
}

impl SpeedtestSettings {
    pub fn new(server_id: u64) -> Self {
        Self {
            binary: PathBuf::from("speedtest"),
            server_id,
            timeout: DEFAULT_TIMEOUT,
            extra_args: Vec::new(),
        }
    }

    /// Full argument list passed to the tool.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--format=json".to_string(),
            "--progress=no".to_string(),
            "-u".to_string(),
            "Mibps".to_string(),
            "-s".to_string(),
            self.server_id.to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// [`MeasurementSource`] backed by the `speedtest` executable.
pub struct SpeedtestCli {
    settings: SpeedtestSettings,
    clock: Arc<dyn Clock>,
}

impl SpeedtestCli {
    pub fn new(settings: SpeedtestSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: SpeedtestSettings, clock: Arc<dyn Clock>) -> Self {
        Self { settings, clock }
    }

    pub fn settings(&self) -> &SpeedtestSettings {
        &self.settings
    }
}

impl std::fmt::Debug for SpeedtestCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeedtestCli").field("settings", &self.settings).finish()
    }
}

#[async_trait]
impl MeasurementSource for SpeedtestCli {
    #[instrument(skip(self), fields(server_id = self.settings.server_id))]
    async fn measure(&self) -> Result<Measurement, MeasurementError> {
        info!("Start measure");

        let child = Command::new(&self.settings.binary)
            .args(self.settings.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MeasurementError::Spawn {
                binary: self.settings.binary.display().to_string(),
                source,
            })?;

        // Dropping the child on timeout kills it.
        let output = tokio::time::timeout(self.settings.timeout, child.wait_with_output())
            .await
            .map_err(|_| MeasurementError::Timeout(self.settings.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(status = %output.status, "measurement tool failed");
            return Err(MeasurementError::ExitStatus {
                status: output.status.to_string(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let measurement = parse_output(&stdout, self.clock.now())?;

        info!(id = %measurement.id, "End measure");
        Ok(measurement)
    }
}

#[derive(Debug, Deserialize)]
struct Report {
    result: ResultSection,
    download: Transfer,
    upload: Transfer,
}

#[derive(Debug, Deserialize)]
struct ResultSection {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Transfer {
    bandwidth: u64,
}

#[derive(Debug, Deserialize)]
struct LogLine {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Option<String>,
}

/// Turn the tool's stdout into a measurement stamped at `taken_at`.
pub fn parse_output(
    stdout: &str,
    taken_at: chrono::NaiveDateTime,
) -> Result<Measurement, MeasurementError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or(MeasurementError::EmptyOutput)?;

    let report: Report = match serde_json::from_str(line) {
        Ok(report) => report,
        Err(e) => {
            // The tool reports its own failures as `{"type":"log",...}` lines.
            if let Ok(log) = serde_json::from_str::<LogLine>(line) {
                if log.kind == "log" {
                    return Err(MeasurementError::malformed(
                        log.message.unwrap_or_else(|| "tool reported an error".to_string()),
                    ));
                }
            }
            return Err(MeasurementError::malformed(e.to_string()));
        }
    };

    let id = Uuid::parse_str(&report.result.id)
        .map_err(|e| MeasurementError::malformed(format!("result id `{}`: {e}", report.result.id)))?;

    Ok(Measurement::new(
        id,
        crate::clock::truncate_to_second(taken_at),
        report.download.bandwidth,
        report.upload.bandwidth,
    ))
}
