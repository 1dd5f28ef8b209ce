//! # Daily Aggregation Pipeline
//!
//! Reduces a stream of PM2.5 readings to one average per UTC calendar day.
//!
//! ## Architecture
//!
//! ```text
//! raw payload (JSON)
//!     ↓
//! decode_reading()            malformed → logged, dropped
//!     ↓
//! DailyAggregationEngine::admit()
//!     ├─ OutlierFilter        value > threshold → logged, dropped
//!     ├─ DayWindow per DayKey (count, sum, first timestamp)
//!     └─ finalize once at ready_threshold samples
//!     ↓
//! FinalizedAggregate → emitter (outside the engine lock)
//! ```
//!
//! ## Module Organization
//!
//! - `types` - Reading, DayKey, FinalizedAggregate
//! - `filter` - outlier predicate
//! - `windows` - per-day accumulator
//! - `engine` - day window manager and finalized-day set
//! - `decoder` - payload decoding
//! - `config` - environment configuration
//! - `ingestion` - async channel loop feeding the engine

pub mod config;
pub mod decoder;
pub mod engine;
pub mod filter;
pub mod ingestion;
pub mod types;
pub mod windows;

// Re-export commonly used types
pub use config::{BackendType, ConfigError, EngineConfig, PipelineConfig};
pub use decoder::{decode_reading, decode_reading_bytes, DecodeError};
pub use engine::{admit_shared, DailyAggregationEngine, EngineSnapshot, EngineStats, SharedEngine};
pub use filter::OutlierFilter;
pub use ingestion::{start_pipeline_ingestion, IngestionStats};
pub use types::{DayKey, FinalizedAggregate, Reading};
pub use windows::{DayWindow, DayWindowSnapshot};
