//! Day-bucketed view over stored measurements.
//!
//! [`History::collect`] consumes a newest-first measurement stream, keeps the
//! records that fall within the last `n` calendar days and groups them by
//! local date. Reading stops at the first record older than the window, which
//! is only correct because repositories list newest first.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveDateTime};
use futures::{Stream, StreamExt};
use tracing::{info, trace};

use crate::clock::hour_start;
use crate::measurement::{Mbits, Measurement};
use crate::storage::{Repository, StorageError};

/// Number of days covered by the startup report.
pub const DEFAULT_HISTORY_DAYS: u32 = 10;

/// All measurements taken on one calendar date, newest first.
///
/// A bucket can only be created from a measurement, so it is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBucket {
    date: NaiveDate,
    measurements: Vec<Measurement>,
}

/// Best throughput seen within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayMax {
    pub download: Mbits,
    pub upload: Mbits,
}

impl DayMax {
    /// True if either maximum is below the threshold.
    pub fn is_below(&self, threshold_mbits: u32) -> bool {
        self.download.is_below(threshold_mbits) || self.upload.is_below(threshold_mbits)
    }
}

impl DayBucket {
    fn new(first: Measurement) -> Self {
        Self {
            date: first.timestamp.date(),
            measurements: vec![first],
        }
    }

    fn push(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// Always false; kept for the `len`/`is_empty` pair.
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Maximum download and upload within the bucket, taken independently.
    pub fn max(&self) -> DayMax {
        let download = self
            .measurements
            .iter()
            .map(Measurement::download_mbits)
            .max()
            .unwrap_or_default();
        let upload = self
            .measurements
            .iter()
            .map(Measurement::upload_mbits)
            .max()
            .unwrap_or_default();
        DayMax { download, upload }
    }

    /// True if any record was taken at or after the start of `now`'s hour.
    pub fn has_entry_since_hour_of(&self, now: NaiveDateTime) -> bool {
        let since = hour_start(now);
        self.measurements.iter().any(|m| m.timestamp >= since)
    }
}

/// Measurements of the last `n` days keyed by date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    days: BTreeMap<NaiveDate, DayBucket>,
}

impl History {
    /// First date inside an `n`-day window ending on `now`'s date.
    pub fn cutoff(days: u32, now: NaiveDateTime) -> Option<NaiveDate> {
        if days == 0 {
            return None;
        }
        now.date().checked_sub_days(Days::new(u64::from(days - 1)))
    }

    /// Bucket a newest-first stream, stopping at the first record older than
    /// the window.
    pub async fn collect<S>(records: S, days: u32, now: NaiveDateTime) -> Result<Self, StorageError>
    where
        S: Stream<Item = Result<Measurement, StorageError>>,
    {
        let mut history = History::default();
        let Some(cutoff) = Self::cutoff(days, now) else {
            return Ok(history);
        };

        futures::pin_mut!(records);
        while let Some(record) = records.next().await {
            let record = record?;
            if record.timestamp.date() < cutoff {
                trace!(timestamp = %record.timestamp, "reached end of window");
                break;
            }
            history.insert(record);
        }
        Ok(history)
    }

    /// Read the last `days` days from a repository.
    pub async fn load(
        repository: &dyn Repository,
        days: u32,
        now: NaiveDateTime,
    ) -> Result<Self, StorageError> {
        info!(days, "Start load history");
        let history = Self::collect(repository.list_all(), days, now).await?;
        info!(days = history.len(), "End load history");
        Ok(history)
    }

    fn insert(&mut self, record: Measurement) {
        match self.days.get_mut(&record.timestamp.date()) {
            Some(bucket) => bucket.push(record),
            None => {
                self.days.insert(record.timestamp.date(), DayBucket::new(record));
            }
        }
    }

    /// Buckets in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = &DayBucket> {
        self.days.values()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DayBucket> {
        self.days.get(&date)
    }

    /// Number of days with at least one record.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Whether the clock hour containing `now` already has a record.
    /// A day without a bucket has none.
    pub fn has_current_hour_entry(&self, now: NaiveDateTime) -> bool {
        self.get(now.date())
            .is_some_and(|today| today.has_entry_since_hour_of(now))
    }
}

#[cfg(test)]
mod tests;
