//! Day-keyed accumulation windows
//!
//! A `DayWindow` holds only the sufficient statistics for a daily mean
//! (count, sum, first timestamp). Individual readings are never retained.

use super::types::{DayKey, Reading};
use serde::Serialize;

/// In-progress accumulator for one UTC calendar day
#[derive(Debug, Clone)]
pub struct DayWindow {
    day_key: DayKey,
    first_timestamp: i64,
    sample_count: u32,
    value_sum: f64,
}

impl DayWindow {
    /// Open a window seeded with its first admitted reading
    pub fn open(day_key: DayKey, first: &Reading) -> Self {
        Self {
            day_key,
            first_timestamp: first.timestamp,
            sample_count: 1,
            value_sum: first.value,
        }
    }

    /// Add a reading to the window
    ///
    /// `first_timestamp` is never touched: it belongs to the first reading
    /// admitted, regardless of the order timestamps arrive in.
    pub fn add(&mut self, reading: &Reading) {
        self.sample_count += 1;
        self.value_sum += reading.value;
    }

    /// Whether adding `value` keeps the running sum finite
    pub fn can_absorb(&self, value: f64) -> bool {
        (self.value_sum + value).is_finite()
    }

    pub fn is_ready(&self, ready_threshold: u32) -> bool {
        self.sample_count >= ready_threshold
    }

    pub fn mean(&self) -> f64 {
        self.value_sum / self.sample_count as f64
    }

    pub fn day_key(&self) -> DayKey {
        self.day_key
    }

    pub fn first_timestamp(&self) -> i64 {
        self.first_timestamp
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn value_sum(&self) -> f64 {
        self.value_sum
    }

    pub fn snapshot(&self, finalized: bool) -> DayWindowSnapshot {
        DayWindowSnapshot {
            day: self.day_key.to_string(),
            first_timestamp: self.first_timestamp,
            sample_count: self.sample_count,
            value_sum: self.value_sum,
            finalized,
        }
    }
}

/// Read-only copy of a window's state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayWindowSnapshot {
    pub day: String,
    pub first_timestamp: i64,
    pub sample_count: u32,
    pub value_sum: f64,
    pub finalized: bool,
}
