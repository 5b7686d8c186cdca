#![allow(dead_code)]

pub mod builders;
pub mod mocks;

pub use builders::measurement::TestMeasurementBuilder;
pub use mocks::{FixedClock, ScriptedSource, SharedBuffer};

use chrono::{NaiveDate, NaiveDateTime};

/// `2024-05-<day> <h>:<m>:00`
pub fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap().and_hms_opt(h, m, 0).unwrap()
}
