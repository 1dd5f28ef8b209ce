//! Unified publisher for finalized aggregates
//!
//! Routes publishes to either the JSONL or SQLite queue based on configuration.

use super::jsonl_publisher::JsonlPublisher;
use super::publisher_backend::{AggregatePublisher, PublishError};
use super::sqlite_publisher::SqlitePublisher;
use crate::pipeline::config::{BackendType, PipelineConfig};
use crate::pipeline::types::FinalizedAggregate;
use async_trait::async_trait;

/// Unified publisher that routes to either JSONL or SQLite backend
pub enum QueuePublisher {
    Jsonl(JsonlPublisher),
    Sqlite(SqlitePublisher),
}

impl QueuePublisher {
    /// Create a publisher for the selected backend using the configured paths
    pub fn new(backend: BackendType, config: &PipelineConfig) -> Result<Self, PublishError> {
        match backend {
            BackendType::Jsonl => Ok(QueuePublisher::Jsonl(JsonlPublisher::new(
                &config.output_path,
            )?)),
            BackendType::Sqlite => Ok(QueuePublisher::Sqlite(SqlitePublisher::new(
                &config.db_path,
            )?)),
        }
    }
}

#[async_trait]
impl AggregatePublisher for QueuePublisher {
    async fn publish(&mut self, aggregate: &FinalizedAggregate) -> Result<(), PublishError> {
        match self {
            QueuePublisher::Jsonl(p) => p.publish(aggregate).await,
            QueuePublisher::Sqlite(p) => p.publish(aggregate).await,
        }
    }

    async fn flush(&mut self) -> Result<(), PublishError> {
        match self {
            QueuePublisher::Jsonl(p) => p.flush().await,
            QueuePublisher::Sqlite(p) => p.flush().await,
        }
    }

    fn backend_type(&self) -> &'static str {
        match self {
            QueuePublisher::Jsonl(_) => "JSONL",
            QueuePublisher::Sqlite(_) => "SQLite",
        }
    }
}
