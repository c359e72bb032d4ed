//! Lifecycle event handling.
//!
//! [`EventHandler`] is the seam between the generic consumer loop and the
//! application: it takes the raw bytes of one message and reports success or a
//! typed failure. [`LifecycleEventHandler`] is the implementation for book
//! lifecycle envelopes:
//!
//! | type           | action                                    |
//! |----------------|-------------------------------------------|
//! | `book.created` | `BookLifecycle::handle_new_book(book_id)` |
//! | `book.updated` | logged, acknowledged                      |
//! | `book.deleted` | logged, acknowledged (ratings are kept)   |
//! | anything else  | logged, acknowledged                      |

use crate::metrics::EventMetrics;
use async_trait::async_trait;
use ratings_core::error::RatingError;
use ratings_core::event::{DecodeError, EventEnvelope, LifecycleEvent};
use ratings_core::types::BookId;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure to process one message.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The message could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The service rejected or failed the operation.
    #[error(transparent)]
    Service(#[from] RatingError),
}

/// Processes the raw bytes of one inbound message.
///
/// Errors are logged by the consumer but do not stop event processing.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one message.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] if the message is malformed or its effect
    /// could not be applied.
    async fn handle(&self, data: &[u8]) -> Result<(), HandlerError>;
}

/// The operations lifecycle events drive.
///
/// Implemented by [`RatingService`](crate::service::RatingService).
#[async_trait]
pub trait BookLifecycle: Send + Sync {
    /// A book was added to the catalogue.
    ///
    /// # Errors
    ///
    /// Returns a [`RatingError`] if the book could not be registered.
    async fn handle_new_book(&self, book_id: BookId) -> Result<(), RatingError>;
}

/// [`EventHandler`] for book lifecycle envelopes.
pub struct LifecycleEventHandler<L: ?Sized> {
    lifecycle: Arc<L>,
}

impl<L: BookLifecycle + ?Sized> LifecycleEventHandler<L> {
    /// Dispatch decoded events to `lifecycle`.
    #[must_use]
    pub const fn new(lifecycle: Arc<L>) -> Self {
        Self { lifecycle }
    }

    async fn dispatch(&self, envelope: &EventEnvelope) -> Result<(), RatingError> {
        match &envelope.event {
            LifecycleEvent::BookCreated(payload) => {
                info!(
                    event_id = %envelope.id,
                    book_id = %payload.book_id,
                    "Handling new book"
                );
                self.lifecycle.handle_new_book(payload.book_id).await
            }
            LifecycleEvent::BookUpdated => {
                info!(event_id = %envelope.id, "Book updated, ratings unaffected");
                Ok(())
            }
            LifecycleEvent::BookDeleted => {
                info!(event_id = %envelope.id, "Book deleted, ratings retained");
                Ok(())
            }
            LifecycleEvent::Unrecognized(event_type) => {
                warn!(event_id = %envelope.id, %event_type, "Unknown event type, skipping");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<L: BookLifecycle + ?Sized> EventHandler for LifecycleEventHandler<L> {
    async fn handle(&self, data: &[u8]) -> Result<(), HandlerError> {
        let envelope = match EventEnvelope::decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                EventMetrics::record_event("unknown", "malformed");
                return Err(e.into());
            }
        };

        let event_type = envelope.event.event_type().to_string();
        debug!(event_id = %envelope.id, %event_type, "Event decoded");

        let applied = matches!(envelope.event, LifecycleEvent::BookCreated(_));
        match self.dispatch(&envelope).await {
            Ok(()) => {
                let outcome = if applied { "applied" } else { "ignored" };
                EventMetrics::record_event(&event_type, outcome);
                Ok(())
            }
            Err(e) => {
                EventMetrics::record_event(&event_type, "failed");
                Err(e.into())
            }
        }
    }
}
