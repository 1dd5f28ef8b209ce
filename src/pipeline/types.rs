//! Core data types for the daily aggregation pipeline
//!
//! - `Reading` - one decoded `{timestamp, value}` measurement
//! - `DayKey` - UTC calendar date used as the sole grouping key
//! - `FinalizedAggregate` - the one-per-day output event (wire format)

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// A single timestamped PM2.5 measurement
///
/// Immutable once constructed. `timestamp` is milliseconds since the Unix epoch (UTC).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: i64,
    pub value: f64,
}

impl Reading {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// UTC calendar day this reading belongs to
    ///
    /// Returns None for timestamps outside the range chrono can represent.
    pub fn day_key(&self) -> Option<DayKey> {
        DayKey::from_timestamp_ms(self.timestamp)
    }
}

/// UTC calendar date (`YYYY-MM-DD`) derived by truncating a millisecond timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_timestamp_ms(timestamp_ms: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(timestamp_ms).map(|dt| DayKey(dt.date_naive()))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        DayKey(date)
    }

    /// Parse a `YYYY-MM-DD` string
    pub fn parse(s: &str) -> Option<Self> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(DayKey)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Key `days` calendar days earlier, saturating at the minimum representable date
    pub fn days_before(&self, days: u32) -> Self {
        DayKey(
            self.0
                .checked_sub_signed(Duration::days(days as i64))
                .unwrap_or(NaiveDate::MIN),
        )
    }

    /// Key `days` calendar days later, saturating at the maximum representable date
    pub fn days_after(&self, days: u32) -> Self {
        DayKey(
            self.0
                .checked_add_signed(Duration::days(days as i64))
                .unwrap_or(NaiveDate::MAX),
        )
    }

    /// Current UTC day
    pub fn today() -> Self {
        DayKey(Utc::now().date_naive())
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Daily aggregate handed to the outbound queue
///
/// Serializes to exactly two fields using the names existing downstream
/// consumers expect: `{"Timestamp": <ms>, "AveragePM2.5": <avg>}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalizedAggregate {
    /// Timestamp of the first reading admitted for the day (ms since epoch)
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,

    /// Mean of the admitted values, rounded to two decimals
    #[serde(rename = "AveragePM2.5")]
    pub average_value: f64,
}

impl FinalizedAggregate {
    /// Parse an aggregate from its wire form
    pub fn from_json(payload: &str) -> Result<Self, Box<dyn Error>> {
        let aggregate: FinalizedAggregate = serde_json::from_str(payload)?;
        Ok(aggregate)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// UTC day this aggregate summarizes
    pub fn day_key(&self) -> Option<DayKey> {
        DayKey::from_timestamp_ms(self.timestamp)
    }
}

/// Round to two decimal places, ties away from zero
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
