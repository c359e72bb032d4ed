//! Event bus consumer with reconnection and graceful shutdown.
//!
//! # Pattern: Subscribe-Process-Reconnect Loop
//!
//! ```text
//! loop {
//!     subscribe (retry after back-off on failure)
//!     loop {
//!         next item:
//!             message        -> handle (bounded by processing timeout), log failures
//!             transport error -> log, sleep back-off, continue
//!             end of stream   -> break and re-subscribe after back-off
//!         shutdown signal     -> stop
//!     }
//! }
//! ```
//!
//! Messages are processed strictly one at a time: a message is fully handled
//! before the next one is read. A failing message is logged and skipped; it
//! never stops the loop.
//!
//! # Example
//!
//! ```rust,ignore
//! let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
//!
//! let topics = vec!["library-events".into()];
//! let handle = EventConsumer::new("book-lifecycle", topics, bus, handler, shutdown_rx)
//!     .with_retry_delay(Duration::from_secs(1))
//!     .spawn();
//!
//! // Later
//! let _ = shutdown_tx.send(());
//! handle.await?;
//! ```

use crate::handler::EventHandler;
use crate::metrics::EventMetrics;
use futures::StreamExt;
use ratings_core::event::EventEnvelope;
use ratings_core::event_bus::{EventBus, InboundMessage, MessageStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Default pause after a transport error or a lost subscription.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound on handling one message.
pub const DEFAULT_PROCESSING_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a processing pass over a stream stopped.
enum StreamEnd {
    Shutdown,
    Disconnected,
}

/// Sequential consumer over an [`EventBus`] subscription.
///
/// Runs until the shutdown channel fires or its sender is dropped.
pub struct EventConsumer {
    /// Consumer name (for logging)
    name: String,

    /// Topics to subscribe to
    topics: Vec<String>,

    event_bus: Arc<dyn EventBus>,

    handler: Arc<dyn EventHandler>,

    shutdown: broadcast::Receiver<()>,

    /// Pause after transport errors and lost subscriptions
    retry_delay: Duration,

    /// Upper bound on one `handle` call
    processing_timeout: Duration,
}

impl EventConsumer {
    /// Create a new event consumer.
    ///
    /// # Arguments
    ///
    /// * `name` - Consumer name for logging
    /// * `topics` - Topics to subscribe to
    /// * `event_bus` - Event bus instance
    /// * `handler` - Handler that processes each message
    /// * `shutdown` - Broadcast receiver for graceful shutdown
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        topics: Vec<String>,
        event_bus: Arc<dyn EventBus>,
        handler: Arc<dyn EventHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            topics,
            event_bus,
            handler,
            shutdown,
            retry_delay: DEFAULT_RETRY_DELAY,
            processing_timeout: DEFAULT_PROCESSING_TIMEOUT,
        }
    }

    /// Set the back-off used after transport errors and lost subscriptions.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the upper bound on handling one message.
    #[must_use]
    pub const fn with_processing_timeout(mut self, timeout: Duration) -> Self {
        self.processing_timeout = timeout;
        self
    }

    /// Spawn the consumer as a background task.
    ///
    /// The returned handle completes once the consumer has stopped.
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the subscribe-process-reconnect loop until shutdown.
    pub async fn run(mut self) {
        info!(consumer = %self.name, topics = ?self.topics, "Event consumer started");

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            let subscribed = tokio::select! {
                _ = self.shutdown.recv() => break,
                result = self.event_bus.subscribe(&topics) => result,
            };

            match subscribed {
                Ok(mut stream) => {
                    info!(consumer = %self.name, "Subscribed to event bus");
                    match self.process_stream(&mut stream).await {
                        StreamEnd::Shutdown => break,
                        StreamEnd::Disconnected => {
                            warn!(
                                consumer = %self.name,
                                "Event stream ended, resubscribing in {:?}",
                                self.retry_delay
                            );
                        }
                    }
                }
                Err(e) => {
                    error!(
                        consumer = %self.name,
                        error = %e,
                        "Failed to subscribe to event bus, retrying in {:?}",
                        self.retry_delay
                    );
                }
            }

            if self.back_off().await {
                break;
            }
        }

        info!(consumer = %self.name, "Event consumer stopped");
    }

    async fn process_stream(&mut self, stream: &mut MessageStream) -> StreamEnd {
        loop {
            let next = tokio::select! {
                _ = self.shutdown.recv() => return StreamEnd::Shutdown,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(message)) => self.process_message(&message).await,
                Some(Err(e)) => {
                    error!(
                        consumer = %self.name,
                        error = %e,
                        "Error receiving message, retrying in {:?}",
                        self.retry_delay
                    );
                    EventMetrics::record_event("unknown", "transport_error");
                    if self.back_off().await {
                        return StreamEnd::Shutdown;
                    }
                }
                None => return StreamEnd::Disconnected,
            }
        }
    }

    async fn process_message(&self, message: &InboundMessage) {
        debug!(
            consumer = %self.name,
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "Processing message"
        );

        match tokio::time::timeout(self.processing_timeout, self.handler.handle(&message.payload))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(
                    consumer = %self.name,
                    offset = message.offset,
                    error = %e,
                    "Failed to handle message, skipping"
                );
            }
            Err(_) => {
                error!(
                    consumer = %self.name,
                    offset = message.offset,
                    timeout = ?self.processing_timeout,
                    "Message processing timed out, skipping"
                );
                EventMetrics::record_event(&event_type_label(&message.payload), "timeout");
            }
        }
    }

    /// Sleep for the retry delay. Returns `true` if shutdown fired meanwhile.
    async fn back_off(&mut self) -> bool {
        tokio::select! {
            _ = self.shutdown.recv() => true,
            () = tokio::time::sleep(self.retry_delay) => false,
        }
    }
}

/// Metric label for a message whose handler never reported back. Payloads
/// that do not decode as an envelope are labelled `unknown`.
fn event_type_label(payload: &[u8]) -> String {
    EventEnvelope::decode(payload).map_or_else(
        |_| "unknown".to_string(),
        |envelope| envelope.event.event_type().to_string(),
    )
}
