//! UTC calendar-day keys and continuous period indices.
//!
//! All calendar-day boundaries in the tracker use fixed UTC, uniformly.
//! Recurrence math works on *continuous* indices (days from CE, a
//! Monday-anchored running week count, `year * 12 + month`) rather than
//! bare "week of year" / "month of year" components, so period boundaries
//! behave correctly across year transitions (week 52 of one year and week
//! 1 of the next are adjacent indices, not a wraparound).

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A calendar day in UTC, used as a recurrence-boundary and history key.
///
/// Serializes as an ISO `YYYY-MM-DD` string, matching the day-key format
/// in stored history documents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// Wraps a calendar date.
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The UTC calendar day an instant falls on.
    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.date_naive())
    }

    /// Returns the underlying date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.0
    }

    /// Continuous day index (days from the Common Era).
    #[must_use]
    pub fn day_index(&self) -> i64 {
        i64::from(self.0.num_days_from_ce())
    }

    /// Continuous Monday-anchored week index.
    ///
    /// 0001-01-01 in the proleptic Gregorian calendar is a Monday, so
    /// weeks run `[1, 7]`, `[8, 14]`, ... in day-from-CE terms. Unlike
    /// ISO week-of-year, this index never wraps at a year boundary.
    #[must_use]
    pub fn week_index(&self) -> i64 {
        (self.day_index() - 1).div_euclid(7)
    }

    /// Continuous month index (`year * 12 + month0`).
    #[must_use]
    pub fn month_index(&self) -> i64 {
        i64::from(self.0.year()) * 12 + i64::from(self.0.month0())
    }
}

impl std::fmt::Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Error returned when parsing a malformed day key.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid day key (expected YYYY-MM-DD): {0}")]
pub struct ParseDayKeyError(String);

impl std::str::FromStr for DayKey {
    type Err = ParseDayKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| ParseDayKeyError(s.to_string()))
    }
}
