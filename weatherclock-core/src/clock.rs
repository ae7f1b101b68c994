//! Wall-clock time for the forecast location.
//!
//! Some target devices ship without a timezone database, so a raw UTC offset
//! learned from the API wins over a named zone, and the host's local time is
//! the last resort.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::model::Location;

pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATE_FORMAT: &str = "%A, %B %d, %Y";

/// Where local time comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    Offset(FixedOffset),
    Named(Tz),
    Host,
}

impl TimeSource {
    pub fn for_location(location: &Location) -> Self {
        if location.utc_offset_seconds != 0 {
            if let Some(offset) = FixedOffset::east_opt(location.utc_offset_seconds) {
                return Self::Offset(offset);
            }
            tracing::warn!(
                utc_offset_seconds = location.utc_offset_seconds,
                "UTC offset out of range"
            );
        }

        if let Some(name) = location.timezone.as_deref() {
            match name.parse::<Tz>() {
                Ok(tz) => return Self::Named(tz),
                Err(_) => tracing::debug!(timezone = name, "Unknown timezone, using host time"),
            }
        }

        Self::Host
    }

    /// Local wall time at `utc`.
    pub fn local_time(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Offset(offset) => utc.with_timezone(offset).naive_local(),
            Self::Named(tz) => utc.with_timezone(tz).naive_local(),
            Self::Host => utc.with_timezone(&Local).naive_local(),
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.local_time(Utc::now())
    }
}

/// One formatted clock reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockReading {
    pub time: String,
    pub date: String,
}

impl ClockReading {
    pub fn at(local: NaiveDateTime) -> Self {
        Self {
            time: local.format(TIME_FORMAT).to_string(),
            date: local.format(DATE_FORMAT).to_string(),
        }
    }
}
