//! Bounded retry for outbound publishes
//!
//! The engine has already marked a day finalized before its aggregate reaches
//! this layer. Retrying the computed aggregate here is the only recovery path;
//! once retries run out the day is lost (at-most-once delivery).

use super::publisher_backend::{AggregatePublisher, PublishError};
use crate::pipeline::types::FinalizedAggregate;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
    current_attempt: u32,
}

#[derive(Debug)]
pub struct MaxRetriesExceeded;

impl std::fmt::Display for MaxRetriesExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum retry attempts exceeded")
    }
}

impl std::error::Error for MaxRetriesExceeded {}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, retries: u32) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max,
            max_retries: retries,
            current_attempt: 0,
        }
    }

    /// Delay before the next attempt, without sleeping
    pub fn next_delay(&self) -> Duration {
        let factor = 2_u32.saturating_pow(self.current_attempt);
        std::cmp::min(self.initial_delay.saturating_mul(factor), self.max_delay)
    }

    pub async fn sleep(&mut self) -> Result<(), MaxRetriesExceeded> {
        if self.current_attempt >= self.max_retries {
            return Err(MaxRetriesExceeded);
        }

        let delay = self.next_delay();

        log::warn!(
            "⏳ Retry attempt {} of {} in {}ms",
            self.current_attempt + 1,
            self.max_retries,
            delay.as_millis()
        );

        sleep(delay).await;
        self.current_attempt += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }
}

/// Publish an aggregate, retrying with backoff on failure
///
/// Returns the last error once the backoff is exhausted.
pub async fn publish_with_retry(
    publisher: &mut dyn AggregatePublisher,
    aggregate: &FinalizedAggregate,
    backoff: &mut ExponentialBackoff,
) -> Result<(), PublishError> {
    backoff.reset();

    loop {
        match publisher.publish(aggregate).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                log::warn!(
                    "Failed to publish aggregate (Timestamp {}) via {}: {}",
                    aggregate.timestamp,
                    publisher.backend_type(),
                    e
                );
                if backoff.sleep().await.is_err() {
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Fails a fixed number of times, then succeeds
    struct FlakyPublisher {
        failures_left: u32,
        published: Vec<FinalizedAggregate>,
    }

    #[async_trait]
    impl AggregatePublisher for FlakyPublisher {
        async fn publish(&mut self, aggregate: &FinalizedAggregate) -> Result<(), PublishError> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(PublishError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "broker unavailable",
                )));
            }
            self.published.push(*aggregate);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), PublishError> {
            Ok(())
        }

        fn backend_type(&self) -> &'static str {
            "Flaky"
        }
    }

    fn aggregate() -> FinalizedAggregate {
        FinalizedAggregate { timestamp: 1000, average_value: 9.5 }
    }

    #[test]
    fn test_backoff_delays_are_capped() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(8), 10);

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        backoff.current_attempt = 2;
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        backoff.current_attempt = 5;
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
        backoff.current_attempt = 40;
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_backoff_exhausts() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(2), 2);

        assert!(backoff.sleep().await.is_ok());
        assert!(backoff.sleep().await.is_ok());
        assert!(backoff.sleep().await.is_err());
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let mut publisher = FlakyPublisher { failures_left: 2, published: Vec::new() };
        let mut backoff =
            ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(2), 3);

        publish_with_retry(&mut publisher, &aggregate(), &mut backoff)
            .await
            .unwrap();

        assert_eq!(publisher.published, vec![aggregate()]);
        assert_eq!(backoff.attempts(), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let mut publisher = FlakyPublisher { failures_left: 10, published: Vec::new() };
        let mut backoff =
            ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(2), 1);

        let result = publish_with_retry(&mut publisher, &aggregate(), &mut backoff).await;

        assert!(matches!(result, Err(PublishError::Io(_))));
        assert!(publisher.published.is_empty());
        // One initial attempt plus one retry
        assert_eq!(publisher.failures_left, 8);
    }
}
