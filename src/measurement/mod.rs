//! Throughput measurement records.
//!
//! A [`Measurement`] is one sample produced by a
//! [`MeasurementSource`](crate::source::MeasurementSource). Rates are stored as
//! bytes per second; the megabit values shown in reports are derived on
//! demand and never persisted.
//!
//! # Examples
//!
//! ```
//! use chrono::NaiveDate;
//! use speedwatch::measurement::Measurement;
//! use uuid::Uuid;
//!
//! let at = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap().and_hms_opt(11, 15, 0).unwrap();
//! let m = Measurement::new(Uuid::nil(), at, 12_500_000, 1_250_000);
//! assert_eq!(m.download_mbits().to_string(), "100.00");
//! assert_eq!(m.upload_mbits().to_string(), "10.00");
//! ```

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bytes per second that make up one megabit per second.
pub const BYTES_PER_MBIT: u64 = 125_000;

/// Base URL of the public result page for a measurement id.
pub const RESULT_LINK_BASE: &str = "https://www.speedtest.net/result/c/";

/// Hundredths of a megabit: the precision reports use.
const CENTI_DIVISOR: u64 = BYTES_PER_MBIT / 100;

/// A megabit-per-second value rounded to two decimal places.
///
/// Held as an integer count of hundredths so comparisons against the
/// threshold are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mbits(u64);

impl Mbits {
    /// Convert a byte rate, rounding half to even at the second decimal.
    pub fn from_bytes_per_sec(bytes_per_sec: u64) -> Self {
        let whole = bytes_per_sec / CENTI_DIVISOR;
        let rem = bytes_per_sec % CENTI_DIVISOR;
        let twice = rem * 2;
        let round_up = twice > CENTI_DIVISOR || (twice == CENTI_DIVISOR && whole % 2 == 1);
        Self(if round_up { whole + 1 } else { whole })
    }

    /// Build from an integer count of hundredths.
    pub fn from_hundredths(hundredths: u64) -> Self {
        Self(hundredths)
    }

    pub fn hundredths(&self) -> u64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// True if strictly below a whole-megabit threshold.
    pub fn is_below(&self, threshold_mbits: u32) -> bool {
        self.0 < u64::from(threshold_mbits) * 100
    }
}

impl fmt::Display for Mbits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// A single throughput sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// Identifier assigned by the measurement tool; primary key in storage.
    pub id: Uuid,
    /// Local wall-clock time the sample was taken, whole seconds.
    pub timestamp: NaiveDateTime,
    pub download_bytes_per_sec: u64,
    pub upload_bytes_per_sec: u64,
}

impl Measurement {
    pub fn new(
        id: Uuid,
        timestamp: NaiveDateTime,
        download_bytes_per_sec: u64,
        upload_bytes_per_sec: u64,
    ) -> Self {
        Self {
            id,
            timestamp,
            download_bytes_per_sec,
            upload_bytes_per_sec,
        }
    }

    pub fn download_mbits(&self) -> Mbits {
        Mbits::from_bytes_per_sec(self.download_bytes_per_sec)
    }

    pub fn upload_mbits(&self) -> Mbits {
        Mbits::from_bytes_per_sec(self.upload_bytes_per_sec)
    }

    /// Public result page for this measurement.
    pub fn result_link(&self) -> String {
        format!("{RESULT_LINK_BASE}{}", self.id)
    }

    /// True if either direction is below the threshold.
    pub fn is_below(&self, threshold_mbits: u32) -> bool {
        self.download_mbits().is_below(threshold_mbits) || self.upload_mbits().is_below(threshold_mbits)
    }
}
