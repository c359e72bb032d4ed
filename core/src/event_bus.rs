//! Event bus abstraction for consuming catalogue events.
//!
//! The rating service does not own book data. It learns about new books from
//! lifecycle events published by the catalogue service on a shared topic, and
//! this module defines the transport seam it reads them through.
//!
//! # Key Principles
//!
//! - **Raw bytes**: the bus moves opaque payloads; decoding lives in
//!   [`event`](crate::event) so the transport never needs to know the schema
//! - **At-least-once delivery**: a message may be delivered more than once, so
//!   every handler must be idempotent
//! - **Ordered within partition**: messages keyed by the same book keep their order
//!
//! # Implementations
//!
//! - `InMemoryEventBus` (in `ratings-testing`): for tests
//! - `RedpandaEventBus` (in `ratings-redpanda`): for production (Kafka-compatible)
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//!
//! let mut stream = event_bus.subscribe(&["library-events"]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(message) => handler.handle(&message.payload).await?,
//!         Err(e) => tracing::error!("Event stream error: {}", e),
//!     }
//! }
//! ```

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// Network or transport error while reading
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// A message read from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was read from
    pub topic: String,
    /// Partition within the topic
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Partition key, if the producer set one
    pub key: Option<Vec<u8>>,
    /// Raw message body
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// Build a message with no key, at partition 0.
    ///
    /// Mostly useful for in-memory transports and tests.
    #[must_use]
    pub fn new(topic: impl Into<String>, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition: 0,
            offset,
            key: None,
            payload,
        }
    }
}

/// Stream of messages from a subscription.
///
/// Transport failures are yielded as `Err` items; the stream keeps going after
/// them unless the underlying connection is gone, in which case it ends.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<InboundMessage, EventBusError>> + Send>>;

/// Read side of the event bus.
///
/// The rating service only consumes lifecycle events; the catalogue service
/// owns the producing side.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so the consumer can hold an `Arc<dyn EventBus>` and be tested against the
/// in-memory bus.
pub trait EventBus: Send + Sync {
    /// Subscribe to one or more topics and receive a stream of messages.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    ///
    /// # Consumer Groups
    ///
    /// Implementations use consumer groups so that several instances of the
    /// service share the partitions of a topic.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, EventBusError>> + Send + '_>>;
}
