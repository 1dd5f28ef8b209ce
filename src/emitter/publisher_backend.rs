//! Publisher backend trait for finalized daily aggregates
//!
//! Defines the outbound queue interface. The engine never calls a publisher;
//! the ingestion loop does, after the engine lock has been released.

use crate::pipeline::types::FinalizedAggregate;
use async_trait::async_trait;

#[derive(Debug)]
pub enum PublishError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
    /// In-process consumer went away
    ChannelClosed,
}

impl From<std::io::Error> for PublishError {
    fn from(err: std::io::Error) -> Self {
        PublishError::Io(err)
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(err)
    }
}

impl From<rusqlite::Error> for PublishError {
    fn from(err: rusqlite::Error) -> Self {
        PublishError::Database(err.to_string())
    }
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Io(e) => write!(f, "IO error: {}", e),
            PublishError::Serialization(e) => write!(f, "Serialization error: {}", e),
            PublishError::Database(e) => write!(f, "Database error: {}", e),
            PublishError::ChannelClosed => write!(f, "Aggregate channel closed"),
        }
    }
}

impl std::error::Error for PublishError {}

/// Backend trait for publishing finalized aggregates
#[async_trait]
pub trait AggregatePublisher: Send {
    /// Publish a single daily aggregate
    async fn publish(&mut self, aggregate: &FinalizedAggregate) -> Result<(), PublishError>;

    /// Flush pending writes to the queue
    async fn flush(&mut self) -> Result<(), PublishError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
