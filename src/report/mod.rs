//! Human-readable report lines.
//!
//! One line per day during the startup report and one per recorded
//! measurement. Anything below the configured threshold is drawn red (or
//! marked, when colour is off) so slow days stand out.

use std::io::{self, Write};

use chrono::{NaiveDate, NaiveDateTime};
use crossterm::style::Stylize;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::history::{DayBucket, DayMax};
use crate::measurement::{Mbits, Measurement};

const DAY_FORMAT: &str = "%d.%m.%y";
const MINUTE_FORMAT: &str = "%d.%m.%y %H:%M";
const BELOW_MARKER: &str = " [below threshold]";

/// Summary of one day in the startup report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub max_download: Mbits,
    pub max_upload: Mbits,
    pub samples: usize,
    pub below_threshold: bool,
}

impl DaySummary {
    pub fn from_bucket(bucket: &DayBucket, threshold_mbits: u32) -> Self {
        let max: DayMax = bucket.max();
        Self {
            date: bucket.date(),
            max_download: max.download,
            max_upload: max.upload,
            samples: bucket.len(),
            below_threshold: max.is_below(threshold_mbits),
        }
    }
}

/// `[dd.MM.yy] Download: X Upload: Y`
pub fn day_line(summary: &DaySummary) -> String {
    format!(
        "[{}] Download: {} Upload: {}",
        summary.date.format(DAY_FORMAT),
        summary.max_download,
        summary.max_upload
    )
}

/// `[dd.MM.yy HH:mm] Download: X Upload: Y`
pub fn measurement_line(measurement: &Measurement, at: NaiveDateTime) -> String {
    format!(
        "[{}] Download: {} Upload: {}",
        at.format(MINUTE_FORMAT),
        measurement.download_mbits(),
        measurement.upload_mbits()
    )
}

/// Writes report lines to an output stream.
///
/// Shared between concurrently running cycles; each line is written whole.
pub struct Reporter {
    threshold_mbits: u32,
    color: bool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("threshold_mbits", &self.threshold_mbits)
            .field("color", &self.color)
            .finish()
    }
}

impl Reporter {
    pub fn new(threshold_mbits: u32, color: bool, out: impl Write + Send + 'static) -> Self {
        Self {
            threshold_mbits,
            color,
            out: Mutex::new(Box::new(out)),
        }
    }

    /// Reporter printing to standard output.
    pub fn stdout(threshold_mbits: u32, color: bool) -> Self {
        Self::new(threshold_mbits, color, io::stdout())
    }

    pub fn threshold_mbits(&self) -> u32 {
        self.threshold_mbits
    }

    /// Print one startup-report line for a day and return its summary.
    pub fn day(&self, bucket: &DayBucket) -> DaySummary {
        let summary = DaySummary::from_bucket(bucket, self.threshold_mbits);
        self.emit(day_line(&summary), summary.below_threshold);
        summary
    }

    /// Print the line for a freshly taken measurement.
    pub fn measurement(&self, measurement: &Measurement, at: NaiveDateTime) {
        self.emit(
            measurement_line(measurement, at),
            measurement.is_below(self.threshold_mbits),
        );
    }

    fn emit(&self, line: String, below: bool) {
        let rendered = match (self.color, below) {
            (true, true) => line.red().to_string(),
            (true, false) => line.green().to_string(),
            (false, true) => format!("{line}{BELOW_MARKER}"),
            (false, false) => line,
        };
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{rendered}").and_then(|_| out.flush()) {
            warn!(error = %e, "failed to write report line");
        }
    }
}
