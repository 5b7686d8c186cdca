//! Local wall-clock access.
//!
//! Everything in the scheduler works on naive local time with second
//! precision, the same resolution the repository stores. The clock is a trait
//! so tests can pin "now" to a known hour.

use chrono::{Local, NaiveDateTime, Timelike};

#[cfg(test)]
use mockall::automock;

/// Source of the current local time.
#[cfg_attr(test, automock)]
pub trait Clock: Send + Sync {
    /// Current local wall-clock time, truncated to whole seconds.
    fn now(&self) -> NaiveDateTime;
}

/// Clock backed by the host's local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        truncate_to_second(Local::now().naive_local())
    }
}

/// Drop sub-second precision.
pub fn truncate_to_second(at: NaiveDateTime) -> NaiveDateTime {
    at.with_nanosecond(0).unwrap_or(at)
}

/// Start of the clock hour containing `at` (minutes and seconds zeroed).
pub fn hour_start(at: NaiveDateTime) -> NaiveDateTime {
    at.date()
        .and_hms_opt(at.hour(), 0, 0)
        .unwrap_or(at)
}
