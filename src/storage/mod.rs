//! Durable measurement storage.
//!
//! The [`Repository`] trait is the only thing the scheduler and the history
//! aggregator know about storage. Two implementations ship with the crate:
//!
//! - [`SqliteRepository`]: one SQLite file, one connection per operation.
//! - [`InMemoryRepository`]: same contract without durability.
//!
//! # Ordering
//!
//! [`Repository::list_all`] must yield records in descending timestamp order.
//! The aggregator stops reading at the first record older than its window, so
//! an unordered stream would silently truncate history.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::stream::BoxStream;
use thiserror::Error;
use uuid::Uuid;

use crate::measurement::Measurement;

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

/// Text layout used to persist timestamps; sorts chronologically.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Lazy, finite stream of stored measurements, newest first.
pub type MeasurementStream = BoxStream<'static, Result<Measurement, StorageError>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("measurement {0} already stored")]
    DuplicateId(Uuid),
    #[error("measurement {id} is timestamped {timestamp}, after write time {now}")]
    FutureTimestamp {
        id: Uuid,
        timestamp: NaiveDateTime,
        now: NaiveDateTime,
    },
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
    #[error("measurement cannot be stored: {0}")]
    InvalidRecord(String),
    #[error("storage task failed: {0}")]
    Task(String),
}

impl StorageError {
    pub(crate) fn corrupt_row<S: Into<String>>(msg: S) -> Self {
        StorageError::CorruptRow(msg.into())
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::Task(err.to_string())
    }
}

/// Append-only store of measurements.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Create the storage target if it does not exist. Never destructive.
    async fn ensure_schema(&self) -> Result<(), StorageError>;

    /// Durably append one record. A duplicate id fails with
    /// [`StorageError::DuplicateId`] and leaves the stored row untouched.
    async fn write(&self, measurement: &Measurement) -> Result<(), StorageError>;

    /// All stored records, newest first. Nothing is read until the stream is
    /// polled, and dropping the stream stops the read.
    fn list_all(&self) -> MeasurementStream;
}

/// Reject records stamped after the write time.
pub(crate) fn check_not_future(
    measurement: &Measurement,
    now: NaiveDateTime,
) -> Result<(), StorageError> {
    if measurement.timestamp > now {
        return Err(StorageError::FutureTimestamp {
            id: measurement.id,
            timestamp: measurement.timestamp,
            now,
        });
    }
    Ok(())
}

pub(crate) fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, StorageError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| StorageError::corrupt_row(format!("timestamp `{raw}`: {e}")))
}
