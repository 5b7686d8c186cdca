//! Speedwatch - hourly network throughput measurements with a rolling report
//!
//! This crate runs an external speed test once per clock hour, stores every
//! result and prints a per-day summary of the last ten days on startup.
//!
//! # Features
//!
//! - **Scheduling**: catch-up measurement when the current hour has no record,
//!   then an hourly timer aligned to the next full hour
//! - **Storage**: append-only SQLite repository, plus an in-memory one
//! - **History**: per-day maximum download and upload over a sliding window
//! - **Reporting**: colour-coded lines flagging anything below a threshold
//!
//! # Examples
//!
//! ```rust
//! use speedwatch::prelude::*;
//! use uuid::Uuid;
//!
//! let taken_at = chrono::NaiveDate::from_ymd_opt(2024, 5, 10)
//!     .unwrap()
//!     .and_hms_opt(11, 15, 0)
//!     .unwrap();
//! let measurement = Measurement::new(Uuid::new_v4(), taken_at, 12_500_000, 5_000_000);
//! assert_eq!(measurement.download_mbits().to_string(), "100.00");
//! assert!(measurement.is_below(50));
//! ```
//!
//! # Error Handling
//!
//! Each boundary has its own error type ([`source::MeasurementError`],
//! [`storage::StorageError`], [`config::ConfigError`]). [`Error`] wraps them
//! for startup code. Errors inside a running measurement cycle never leave the
//! scheduler; they are logged and the cycle is dropped.

#![doc(html_root_url = "https://docs.rs/speedwatch/0.1.0")]

pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod measurement;
pub mod report;
pub mod scheduler;
pub mod source;
pub mod storage;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::{Config, ConfigError, Overrides};
    pub use crate::history::{DayBucket, DayMax, History};
    pub use crate::measurement::{Mbits, Measurement};
    pub use crate::report::{DaySummary, Reporter};
    pub use crate::scheduler::{
        CycleOutcome, Scheduler, SchedulerHandle, SchedulerSettings, SchedulerState, StartupSummary,
    };
    pub use crate::source::{MeasurementError, MeasurementSource, SpeedtestCli, SpeedtestSettings};
    pub use crate::storage::{InMemoryRepository, Repository, SqliteRepository, StorageError};
    pub use crate::{Error, Result};
}
