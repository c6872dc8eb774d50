//! Queue publishing with delivery acknowledgment
//!
//! Every written artifact is announced by publishing its path to a topic. A
//! publish call hands the message to a [`BrokerClient`] and then waits for
//! that message's own delivery report, bounded by a timeout and by shutdown.
//!
//! # Components
//!
//! - [`QueuePublisher`] - What the executor depends on
//! - [`producer::BrokerPublisher`] - Acknowledging publisher over any [`BrokerClient`]
//! - [`memory::MemoryBroker`] - In-process broker for tests and dry runs
//! - `kafka::KafkaBroker` - librdkafka client (cargo feature `kafka`)

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::shutdown::ShutdownCoordinator;

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod producer;

/// Bound on each delivery acknowledgment wait
pub const ACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on flushing pending deliveries at close
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Publishing errors
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The publisher was closed
    #[error("producer is closed")]
    Closed,

    /// No topic given
    #[error("topic cannot be empty")]
    EmptyTopic,

    /// The broker client refused the message
    #[error("failed to produce message to topic '{topic}' on broker '{broker}': {reason}")]
    Produce {
        /// Broker address
        broker: String,
        /// Target topic
        topic: String,
        /// Client error
        reason: String,
    },

    /// The broker reported a failed delivery
    #[error("delivery failed for topic '{topic}' on broker '{broker}': {reason}")]
    DeliveryFailed {
        /// Broker address
        broker: String,
        /// Target topic
        topic: String,
        /// Broker error
        reason: String,
    },

    /// No delivery report arrived in time
    #[error("publish timeout after {} seconds", .0.as_secs())]
    AckTimeout(Duration),

    /// The client dropped the acknowledgment channel without reporting
    #[error("delivery report channel closed before acknowledgment")]
    AckDropped,

    /// Shutdown requested while waiting for the acknowledgment
    #[error("publish cancelled")]
    Cancelled,

    /// Pending deliveries could not be flushed at close
    #[error("failed to flush pending deliveries: {0}")]
    Flush(String),

    /// The broker client could not be created
    #[error("failed to create broker client: {0}")]
    Client(String),
}

/// Where a message ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Topic written to
    pub topic: String,
    /// Partition written to
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
}

/// Outcome of one delivery: the report, or the broker's error text
pub type DeliveryResult = Result<DeliveryReport, String>;

/// Client-wide events, independent of any single publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// A message was delivered
    Delivered(DeliveryReport),
    /// A message could not be delivered
    DeliveryFailed {
        /// Target topic
        topic: String,
        /// Broker error
        reason: String,
    },
    /// Client-level error (connection loss, auth, ...)
    Error(String),
}

/// Low-level broker capability
///
/// `produce` must not block on delivery: it enqueues the message and later
/// resolves `ack` exactly once. `flush` may block the calling thread.
pub trait BrokerClient: Send + Sync + 'static {
    /// Enqueue `payload` for `topic`
    fn produce(
        &self,
        topic: &str,
        payload: &[u8],
        ack: oneshot::Sender<DeliveryResult>,
    ) -> Result<(), String>;

    /// Wait for every enqueued message to be delivered or failed
    fn flush(&self, timeout: Duration) -> Result<(), String>;
}

/// Publishes artifact locations
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Publish `message` to `topic` and wait for its acknowledgment
    ///
    /// `broker` names the destination for diagnostics; the connection itself
    /// is fixed when the publisher is built.
    async fn publish(
        &self,
        shutdown: &ShutdownCoordinator,
        broker: &str,
        topic: &str,
        message: &str,
    ) -> Result<(), PublishError>;

    /// Flush pending deliveries and release the client. Idempotent.
    async fn close(&self) -> Result<(), PublishError>;
}
