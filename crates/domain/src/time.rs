//! Time and timestamp helpers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{ScheduleError, ValidationError};

/// UTC timestamp used for event times, pushes and overrides.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// A wall-clock time of day written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    /// Build from hours and minutes, `None` when out of range.
    #[must_use]
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    #[must_use]
    pub fn as_naive(self) -> NaiveTime {
        self.0
    }
}

impl From<NaiveTime> for ClockTime {
    fn from(value: NaiveTime) -> Self {
        Self(value)
    }
}

impl FromStr for ClockTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|_| ValidationError::InvalidClockTime(s.to_string()))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// Convert a local wall-clock instant in `tz` to UTC.
///
/// Ambiguous instants (clocks going back) resolve to the earlier one.
/// Instants inside a gap (clocks going forward) are shifted forward by one
/// hour, landing just after the transition.
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidLocalTime`] when no mapping exists even
/// after shifting.
pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> Result<Timestamp, ScheduleError> {
    if let Some(resolved) = tz.from_local_datetime(&local).earliest() {
        return Ok(resolved.with_timezone(&Utc));
    }
    let shifted = local + Duration::hours(1);
    tz.from_local_datetime(&shifted)
        .earliest()
        .map(|resolved| resolved.with_timezone(&Utc))
        .ok_or_else(|| ScheduleError::InvalidLocalTime(local.to_string()))
}

/// The calendar date of `t` as observed in `tz`.
#[must_use]
pub fn local_date(tz: Tz, t: Timestamp) -> NaiveDate {
    t.with_timezone(&tz).date_naive()
}

/// The wall-clock time of `t` as observed in `tz`.
#[must_use]
pub fn local_time(tz: Tz, t: Timestamp) -> NaiveTime {
    t.with_timezone(&tz).time()
}
