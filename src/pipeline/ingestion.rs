//! Pipeline ingestion - async channel processor for raw reading payloads
//!
//! Main loop:
//! 1. Receives raw payloads from a reading source via mpsc channel
//! 2. Decodes each payload (malformed payloads are logged and dropped)
//! 3. Admits the reading through the engine (lock held for one `admit` only)
//! 4. Hands any finalized aggregate to the publisher task
//!
//! The publish itself never runs here, so a slow or unavailable downstream
//! queue cannot stall the intake of later readings.

use super::decoder::decode_reading;
use super::engine::{admit_shared, SharedEngine};
use super::types::FinalizedAggregate;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

/// Counters for one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestionStats {
    /// Payloads pulled off the channel
    pub received: u64,
    /// Payloads rejected by the decoder
    pub malformed: u64,
    /// Aggregates handed to the publisher
    pub finalized: u64,
    /// Aggregates dropped because the publisher task was gone
    pub undeliverable: u64,
}

/// Start pipeline ingestion from the payload channel
///
/// Runs until the payload channel closes (source shutdown), then returns the
/// run's counters. Dropping `aggregate_tx` on return lets the publisher task
/// drain and stop.
pub async fn start_pipeline_ingestion(
    mut rx: mpsc::Receiver<String>,
    engine: SharedEngine,
    aggregate_tx: mpsc::UnboundedSender<FinalizedAggregate>,
    status_interval_ms: u64,
) -> IngestionStats {
    log::info!("🚀 Starting reading ingestion");
    log::info!("   └─ Status interval: {}ms", status_interval_ms);

    let mut stats = IngestionStats::default();
    let mut status_timer = interval(Duration::from_millis(status_interval_ms.max(1)));
    status_timer.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(payload) = received else {
                    log::warn!("⚠️  Reading channel closed, stopping ingestion");
                    break;
                };
                stats.received += 1;

                let reading = match decode_reading(&payload) {
                    Ok(reading) => reading,
                    Err(e) => {
                        log::warn!("⚠️  Dropping payload: {} ({})", e, truncate(&payload, 120));
                        stats.malformed += 1;
                        continue;
                    }
                };

                // Lock scope is exactly one admit call
                let finalized = admit_shared(&engine, reading);

                if let Some(aggregate) = finalized {
                    stats.finalized += 1;
                    if aggregate_tx.send(aggregate).is_err() {
                        log::error!(
                            "❌ Publisher task gone, aggregate lost: Timestamp={} AveragePM2.5={:.2}",
                            aggregate.timestamp,
                            aggregate.average_value
                        );
                        stats.undeliverable += 1;
                    }
                }
            }

            _ = status_timer.tick() => {
                let (open_windows, finalized_days, engine_stats) = {
                    let guard = engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    (guard.open_window_count(), guard.finalized_count(), guard.stats())
                };

                log::info!(
                    "📊 Status: {} open windows, {} finalized days | admitted={} outliers={} late={} stale={} malformed={} | channel: {}",
                    open_windows,
                    finalized_days,
                    engine_stats.admitted,
                    engine_stats.outliers,
                    engine_stats.late,
                    engine_stats.stale,
                    stats.malformed,
                    rx.len()
                );
            }
        }
    }

    log::info!(
        "✅ Reading ingestion stopped ({} payloads, {} malformed, {} days finalized)",
        stats.received,
        stats.malformed,
        stats.finalized
    );
    stats
}

fn truncate(payload: &str, max_chars: usize) -> String {
    if payload.chars().count() <= max_chars {
        payload.to_string()
    } else {
        let head: String = payload.chars().take(max_chars).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::EngineConfig;
    use crate::pipeline::engine::DailyAggregationEngine;
    use crate::pipeline::types::DayKey;

    // 2023-11-14T00:00:00Z
    const DAY0: i64 = 1_699_920_000_000;

    fn payload(timestamp: i64, value: f64) -> String {
        format!(r#"{{"timestamp": {}, "value": {}}}"#, timestamp, value)
    }

    #[tokio::test]
    async fn test_ingestion_finalizes_and_forwards() {
        let (tx, rx) = mpsc::channel(100);
        let (agg_tx, mut agg_rx) = mpsc::unbounded_channel();
        let engine = DailyAggregationEngine::shared(EngineConfig::default());

        let handle = tokio::spawn(start_pipeline_ingestion(rx, engine.clone(), agg_tx, 60_000));

        for i in 0..12 {
            tx.send(payload(DAY0 + i * 1000, 10.0 + i as f64)).await.unwrap();
        }
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.received, 12);
        assert_eq!(stats.finalized, 1);
        assert_eq!(stats.malformed, 0);

        let aggregate = agg_rx.recv().await.unwrap();
        assert_eq!(aggregate.timestamp, DAY0);
        // Mean of 10..=19
        assert_eq!(aggregate.average_value, 14.5);
        assert!(agg_rx.recv().await.is_none());

        let guard = engine.lock().unwrap();
        assert_eq!(guard.stats().late, 2);
        assert!(guard.is_finalized(&DayKey::from_timestamp_ms(DAY0).unwrap()));
    }

    #[tokio::test]
    async fn test_malformed_payloads_dropped_without_state_change() {
        let (tx, rx) = mpsc::channel(100);
        let (agg_tx, _agg_rx) = mpsc::unbounded_channel();
        let engine = DailyAggregationEngine::shared(EngineConfig::default());

        let handle = tokio::spawn(start_pipeline_ingestion(rx, engine.clone(), agg_tx, 60_000));

        tx.send("not json".to_string()).await.unwrap();
        tx.send(r#"{"value": 3.0}"#.to_string()).await.unwrap();
        tx.send(r#"{"timestamp": 1000}"#.to_string()).await.unwrap();
        tx.send(payload(DAY0, 75.0)).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.received, 4);
        assert_eq!(stats.malformed, 3);

        let guard = engine.lock().unwrap();
        assert!(guard.snapshot().windows.is_empty());
        assert_eq!(guard.stats().outliers, 1);
    }

    #[tokio::test]
    async fn test_missing_publisher_counts_undeliverable() {
        let (tx, rx) = mpsc::channel(100);
        let (agg_tx, agg_rx) = mpsc::unbounded_channel();
        drop(agg_rx);
        let engine = DailyAggregationEngine::shared(EngineConfig::default());

        let handle = tokio::spawn(start_pipeline_ingestion(rx, engine.clone(), agg_tx, 60_000));
        for i in 0..10 {
            tx.send(payload(DAY0 + i, 1.0)).await.unwrap();
        }
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.finalized, 1);
        assert_eq!(stats.undeliverable, 1);

        // The day stays finalized even though delivery failed
        let guard = engine.lock().unwrap();
        assert_eq!(guard.finalized_count(), 1);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
