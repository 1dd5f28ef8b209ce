//! In-process publisher forwarding aggregates over a tokio channel

use super::publisher_backend::{AggregatePublisher, PublishError};
use crate::pipeline::types::FinalizedAggregate;
use async_trait::async_trait;
use tokio::sync::mpsc;

pub struct ChannelPublisher {
    tx: mpsc::Sender<FinalizedAggregate>,
}

impl ChannelPublisher {
    pub fn new(tx: mpsc::Sender<FinalizedAggregate>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl AggregatePublisher for ChannelPublisher {
    async fn publish(&mut self, aggregate: &FinalizedAggregate) -> Result<(), PublishError> {
        self.tx
            .send(*aggregate)
            .await
            .map_err(|_| PublishError::ChannelClosed)
    }

    async fn flush(&mut self) -> Result<(), PublishError> {
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "Channel"
    }
}
