//! Daily aggregation engine - the day window manager
//!
//! Owns every `DayWindow` and the finalized-day set. Each call to
//! [`DailyAggregationEngine::admit`] runs to completion without I/O, so a
//! single mutex around the engine makes the check-then-finalize sequence
//! indivisible when readings arrive from several threads.
//!
//! ## Finalization policy
//!
//! A day finalizes the moment its window holds `ready_threshold` samples,
//! not at a wall-clock day boundary. Finalize time therefore follows traffic
//! volume, and a day that never collects enough samples is never emitted.
//! There is no end-of-day flush.
//!
//! ## Retention
//!
//! Windows and finalized entries older than `retention_days` before the newest
//! day seen are evicted. Readings for days behind that horizon are dropped as
//! stale, which keeps an evicted finalized day from ever being re-opened.
//!
//! Only days up to [`FUTURE_TOLERANCE_DAYS`] past the current UTC day move the
//! horizon. A reading stamped further ahead is still windowed, but it cannot
//! push the horizon past the days real traffic is arriving for.

use super::config::EngineConfig;
use super::filter::OutlierFilter;
use super::types::{round_to_cents, DayKey, FinalizedAggregate, Reading};
use super::windows::{DayWindow, DayWindowSnapshot};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Days past the current UTC day that may still advance the retention horizon
pub const FUTURE_TOLERANCE_DAYS: u32 = 1;

/// Source of the current UTC day
pub type DayClock = fn() -> DayKey;

/// Engine shared between ingestion tasks
pub type SharedEngine = Arc<Mutex<DailyAggregationEngine>>;

/// Counters describing what the engine did with the readings it was given
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Readings added to a window
    pub admitted: u64,
    /// Readings above the outlier threshold (or non-finite)
    pub outliers: u64,
    /// Readings for a day that was already finalized
    pub late: u64,
    /// Readings for a day behind the retention horizon
    pub stale: u64,
    /// Readings with an unusable timestamp or value
    pub rejected: u64,
    /// Days finalized since creation (or last reset)
    pub finalized_days: u64,
    /// Windows dropped by the retention policy
    pub evicted_windows: u64,
}

/// Read-only view of the whole engine state
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub windows: Vec<DayWindowSnapshot>,
    pub finalized_days: Vec<String>,
    pub retention_horizon: Option<String>,
    pub stats: EngineStats,
}

pub struct DailyAggregationEngine {
    filter: OutlierFilter,
    ready_threshold: u32,
    /// 0 disables eviction
    retention_days: u32,

    windows: HashMap<DayKey, DayWindow>,
    finalized: HashSet<DayKey>,

    /// Newest plausible day admitted so far, drives the retention horizon
    newest_day: Option<DayKey>,
    clock: DayClock,

    stats: EngineStats,
}

impl DailyAggregationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, DayKey::today)
    }

    /// Engine that judges future-dated readings against `clock` instead of the wall clock
    pub fn with_clock(config: EngineConfig, clock: DayClock) -> Self {
        Self {
            filter: OutlierFilter::new(config.outlier_threshold),
            ready_threshold: config.ready_threshold.max(1),
            retention_days: config.retention_days,
            windows: HashMap::new(),
            finalized: HashSet::new(),
            newest_day: None,
            clock,
            stats: EngineStats::default(),
        }
    }

    /// Wrap a fresh engine for sharing across tasks or threads
    pub fn shared(config: EngineConfig) -> SharedEngine {
        Arc::new(Mutex::new(Self::new(config)))
    }

    /// Admit one reading
    ///
    /// Returns the day's aggregate exactly once: on the call that brings the
    /// day's window to `ready_threshold` samples. Every other call returns None.
    pub fn admit(&mut self, reading: Reading) -> Option<FinalizedAggregate> {
        if reading.timestamp < 0 {
            log::warn!("Received reading with negative timestamp: {}", reading.timestamp);
            self.stats.rejected += 1;
            return None;
        }

        if !self.filter.accept(&reading) {
            self.stats.outliers += 1;
            return None;
        }

        let day_key = match reading.day_key() {
            Some(key) => key,
            None => {
                log::warn!("Timestamp out of range: {}", reading.timestamp);
                self.stats.rejected += 1;
                return None;
            }
        };

        if let Some(horizon) = self.retention_horizon() {
            if day_key < horizon {
                log::debug!(
                    "Stale reading for {} (horizon {}): {}",
                    day_key,
                    horizon,
                    reading.value
                );
                self.stats.stale += 1;
                return None;
            }
        }

        if self.finalized.contains(&day_key) {
            log::debug!("Day {} already finalized, dropping {}", day_key, reading.value);
            self.stats.late += 1;
            return None;
        }

        let window = match self.windows.entry(day_key) {
            Entry::Occupied(entry) => {
                let window = entry.into_mut();
                if !window.can_absorb(reading.value) {
                    log::warn!(
                        "Value {} would overflow the running sum for {}",
                        reading.value,
                        day_key
                    );
                    self.stats.rejected += 1;
                    return None;
                }
                window.add(&reading);
                window
            }
            Entry::Vacant(entry) => entry.insert(DayWindow::open(day_key, &reading)),
        };

        self.stats.admitted += 1;
        log::debug!(
            "Data stored for {}: {} at {} ({} samples)",
            day_key,
            reading.value,
            reading.timestamp,
            window.sample_count()
        );

        let finalized = if window.is_ready(self.ready_threshold) {
            Some(FinalizedAggregate {
                timestamp: window.first_timestamp(),
                average_value: round_to_cents(window.mean()),
            })
        } else {
            None
        };

        if let Some(aggregate) = finalized {
            self.finalized.insert(day_key);
            self.stats.finalized_days += 1;
            log::info!(
                "Finalized {}: average {:.2} over {} samples",
                day_key,
                aggregate.average_value,
                self.ready_threshold
            );
        }

        self.advance_newest_day(day_key);

        finalized
    }

    /// Drop windows and finalized entries for days strictly before `cutoff`
    ///
    /// Returns the number of windows removed.
    pub fn evict_before(&mut self, cutoff: DayKey) -> usize {
        let before = self.windows.len();
        self.windows.retain(|day, _| *day >= cutoff);
        self.finalized.retain(|day| *day >= cutoff);

        let evicted = before - self.windows.len();
        if evicted > 0 {
            log::info!("Evicted {} day windows older than {}", evicted, cutoff);
        }
        self.stats.evicted_windows += evicted as u64;
        evicted
    }

    /// Oldest day still accepted, if retention is enabled and a day has been seen
    pub fn retention_horizon(&self) -> Option<DayKey> {
        if self.retention_days == 0 {
            return None;
        }
        self.newest_day.map(|day| day.days_before(self.retention_days))
    }

    /// Forget all windows, finalized days and counters
    pub fn reset(&mut self) {
        self.windows.clear();
        self.finalized.clear();
        self.newest_day = None;
        self.stats = EngineStats::default();
    }

    pub fn is_finalized(&self, day: &DayKey) -> bool {
        self.finalized.contains(day)
    }

    pub fn window(&self, day: &DayKey) -> Option<DayWindowSnapshot> {
        self.windows
            .get(day)
            .map(|w| w.snapshot(self.finalized.contains(day)))
    }

    pub fn open_window_count(&self) -> usize {
        self.windows
            .keys()
            .filter(|day| !self.finalized.contains(day))
            .count()
    }

    pub fn finalized_count(&self) -> usize {
        self.finalized.len()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn ready_threshold(&self) -> u32 {
        self.ready_threshold
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let mut windows: Vec<DayWindowSnapshot> = self
            .windows
            .iter()
            .map(|(day, w)| w.snapshot(self.finalized.contains(day)))
            .collect();
        windows.sort_by(|a, b| a.day.cmp(&b.day));

        let mut finalized: Vec<DayKey> = self.finalized.iter().copied().collect();
        finalized.sort();

        EngineSnapshot {
            windows,
            finalized_days: finalized.iter().map(|d| d.to_string()).collect(),
            retention_horizon: self.retention_horizon().map(|d| d.to_string()),
            stats: self.stats,
        }
    }

    fn advance_newest_day(&mut self, day: DayKey) {
        let latest_plausible = (self.clock)().days_after(FUTURE_TOLERANCE_DAYS);
        if day > latest_plausible {
            log::warn!(
                "Reading for {} is ahead of {}, not moving the retention horizon",
                day,
                latest_plausible
            );
            return;
        }

        let advanced = match self.newest_day {
            Some(newest) => day > newest,
            None => true,
        };
        if !advanced {
            return;
        }

        self.newest_day = Some(day);
        if let Some(horizon) = self.retention_horizon() {
            self.evict_before(horizon);
        }
    }
}

impl Default for DailyAggregationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Admit a reading through a shared engine, holding the lock for one call only
///
/// A poisoned lock is recovered: `admit` never leaves the engine half-updated
/// across a panic point.
pub fn admit_shared(
    engine: &Mutex<DailyAggregationEngine>,
    reading: Reading,
) -> Option<FinalizedAggregate> {
    let mut guard = engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.admit(reading)
}
