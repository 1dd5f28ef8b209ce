//! Aggregate emitter - outbound queue boundary
//!
//! The engine only hands back `FinalizedAggregate` values. Everything that
//! touches the network or disk on the way out lives here:
//!
//! ```text
//! FinalizedAggregate
//!     ↓
//! publish_with_retry (bounded exponential backoff)
//!     ↓
//! AggregatePublisher → JSONL file | SQLite table | in-process channel
//! ```
//!
//! Delivery is at-most-once: a day is finalized before it is published, and an
//! aggregate whose retries are exhausted is logged and dropped.

pub mod channel_publisher;
pub mod dispatcher;
pub mod error_handler;
pub mod jsonl_publisher;
pub mod publisher;
pub mod publisher_backend;
pub mod sqlite_publisher;

pub use channel_publisher::ChannelPublisher;
pub use dispatcher::{run_publisher, PublisherStats};
pub use error_handler::{publish_with_retry, ExponentialBackoff, MaxRetriesExceeded};
pub use jsonl_publisher::JsonlPublisher;
pub use publisher::QueuePublisher;
pub use publisher_backend::{AggregatePublisher, PublishError};
pub use sqlite_publisher::SqlitePublisher;
