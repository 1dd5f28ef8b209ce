//! SQLite queue table for finalized aggregates
//!
//! Rows are keyed by UTC day, so a replayed publish (glue-level retry after an
//! ambiguous failure) can never duplicate a day for downstream readers.

use super::publisher_backend::{AggregatePublisher, PublishError};
use crate::pipeline::types::FinalizedAggregate;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;

pub struct SqlitePublisher {
    conn: Connection,
}

impl SqlitePublisher {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, PublishError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PublishError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create database directory {}: {}", parent.display(), e),
                ))
            })?;
        }

        let conn = Connection::open(db_path)?;

        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS daily_aggregates (
                day TEXT PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                average_pm25 REAL NOT NULL,
                published_at INTEGER NOT NULL
            )",
            [],
        )?;

        log::info!("✅ SQLite aggregate queue initialized (journal_mode={})", journal_mode);

        Ok(Self { conn })
    }

    /// Insert one aggregate; returns false when the day was already queued
    pub fn insert_aggregate(
        &mut self,
        aggregate: &FinalizedAggregate,
    ) -> Result<bool, PublishError> {
        let day = aggregate.day_key().ok_or_else(|| {
            PublishError::Database(format!("timestamp out of range: {}", aggregate.timestamp))
        })?;

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO daily_aggregates (day, timestamp, average_pm25, published_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                day.to_string(),
                aggregate.timestamp,
                aggregate.average_value,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;

        if inserted == 0 {
            log::warn!("Aggregate for {} already queued, skipping duplicate", day);
        }

        Ok(inserted > 0)
    }
}

#[async_trait]
impl AggregatePublisher for SqlitePublisher {
    async fn publish(&mut self, aggregate: &FinalizedAggregate) -> Result<(), PublishError> {
        self.insert_aggregate(aggregate)?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), PublishError> {
        // Each insert commits on its own
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
