//! Publisher task - drains finalized aggregates into the outbound queue
//!
//! Runs apart from ingestion so retries and slow brokers only delay other
//! aggregates, never the intake of readings.

use super::error_handler::{publish_with_retry, ExponentialBackoff};
use super::publisher_backend::AggregatePublisher;
use crate::pipeline::types::FinalizedAggregate;
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublisherStats {
    pub published: u64,
    /// Aggregates lost after all retries failed
    pub failed: u64,
}

/// Publish every aggregate received on `rx` until the channel closes
pub async fn run_publisher(
    mut rx: mpsc::UnboundedReceiver<FinalizedAggregate>,
    mut publisher: Box<dyn AggregatePublisher>,
    mut backoff: ExponentialBackoff,
) -> PublisherStats {
    log::info!("📤 Publisher task started (backend: {})", publisher.backend_type());
    let mut stats = PublisherStats::default();

    while let Some(aggregate) = rx.recv().await {
        match publish_with_retry(publisher.as_mut(), &aggregate, &mut backoff).await {
            Ok(()) => {
                stats.published += 1;
                log::info!(
                    "Data sent to {}: Timestamp={} AveragePM2.5={:.2}",
                    publisher.backend_type(),
                    aggregate.timestamp,
                    aggregate.average_value
                );
            }
            Err(e) => {
                stats.failed += 1;
                log::error!(
                    "❌ Aggregate lost after retries (Timestamp={} AveragePM2.5={:.2}): {}",
                    aggregate.timestamp,
                    aggregate.average_value,
                    e
                );
            }
        }
    }

    if let Err(e) = publisher.flush().await {
        log::error!("❌ Failed final publisher flush: {}", e);
    }

    log::info!(
        "✅ Publisher task stopped ({} published, {} lost)",
        stats.published,
        stats.failed
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::publisher_backend::PublishError;
    use crate::emitter::ChannelPublisher;
    use async_trait::async_trait;
    use std::time::Duration;

    struct BrokenPublisher;

    #[async_trait]
    impl AggregatePublisher for BrokenPublisher {
        async fn publish(&mut self, _aggregate: &FinalizedAggregate) -> Result<(), PublishError> {
            Err(PublishError::Database("queue unavailable".to_string()))
        }

        async fn flush(&mut self) -> Result<(), PublishError> {
            Ok(())
        }

        fn backend_type(&self) -> &'static str {
            "Broken"
        }
    }

    fn fast_backoff(retries: u32) -> ExponentialBackoff {
        ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(2), retries)
    }

    #[tokio::test]
    async fn test_publishes_in_order() {
        let (agg_tx, agg_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::channel(10);

        let handle = tokio::spawn(run_publisher(
            agg_rx,
            Box::new(ChannelPublisher::new(out_tx)),
            fast_backoff(0),
        ));

        let first = FinalizedAggregate { timestamp: 1, average_value: 1.0 };
        let second = FinalizedAggregate { timestamp: 86_400_001, average_value: 2.0 };
        agg_tx.send(first).unwrap();
        agg_tx.send(second).unwrap();
        drop(agg_tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats, PublisherStats { published: 2, failed: 0 });
        assert_eq!(out_rx.recv().await.unwrap(), first);
        assert_eq!(out_rx.recv().await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_failed_publish_is_counted_not_retried_forever() {
        let (agg_tx, agg_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(run_publisher(
            agg_rx,
            Box::new(BrokenPublisher),
            fast_backoff(2),
        ));

        agg_tx.send(FinalizedAggregate { timestamp: 1, average_value: 1.0 }).unwrap();
        drop(agg_tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats, PublisherStats { published: 0, failed: 1 });
    }
}
