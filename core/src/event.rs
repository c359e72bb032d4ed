//! Book lifecycle events consumed from the catalogue topic.
//!
//! Messages arrive as JSON envelopes:
//!
//! ```json
//! {
//!   "id": "evt-42",
//!   "type": "book.created",
//!   "timestamp": "2025-01-01T12:00:00Z",
//!   "payload": { "book_id": "7d9f5c1e-5b6a-4c1e-9c39-0d7d6f3f2a10", "name": "Dune" }
//! }
//! ```
//!
//! # Decoding
//!
//! Decoding is tag-driven. The envelope is parsed first with the payload kept as
//! unparsed JSON ([`RawValue`]); the payload is then decoded into its concrete
//! shape only for event types the service acts on. Types the service ignores
//! never have their payload inspected, and unknown types decode to
//! [`LifecycleEvent::Unrecognized`] instead of failing.
//!
//! # Example
//!
//! ```
//! use ratings_core::event::{EventEnvelope, LifecycleEvent};
//!
//! let bytes = br#"{"id":"1","type":"book.deleted","payload":{}}"#;
//! let envelope = EventEnvelope::decode(bytes).expect("valid envelope");
//! assert_eq!(envelope.event, LifecycleEvent::BookDeleted);
//! ```

use crate::types::BookId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

/// Type tag of a book creation event.
pub const BOOK_CREATED: &str = "book.created";
/// Type tag of a book update event.
pub const BOOK_UPDATED: &str = "book.updated";
/// Type tag of a book deletion event.
pub const BOOK_DELETED: &str = "book.deleted";

/// Errors raised while decoding an inbound message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The message is not a valid envelope.
    #[error("malformed event envelope: {0}")]
    Envelope(String),

    /// An acted-upon event arrived without a payload.
    #[error("{0} event carries no payload")]
    MissingPayload(String),

    /// The payload does not match the shape required by its type tag.
    #[error("malformed {event_type} payload: {reason}")]
    Payload {
        /// Type tag of the offending event
        event_type: String,
        /// Decoder message
        reason: String,
    },
}

/// Payload of book events. Only `book_id` is used by the rating service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookPayload {
    /// The book the event is about
    pub book_id: BookId,
    /// Title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Publication year
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Genre
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

/// A decoded lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A new book was added to the catalogue.
    BookCreated(BookPayload),
    /// A book's metadata changed. Ratings are unaffected.
    BookUpdated,
    /// A book was removed from the catalogue. Ratings are kept.
    BookDeleted,
    /// Any other type tag, carried for logging.
    Unrecognized(String),
}

impl LifecycleEvent {
    /// The wire type tag of this event.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::BookCreated(_) => BOOK_CREATED,
            Self::BookUpdated => BOOK_UPDATED,
            Self::BookDeleted => BOOK_DELETED,
            Self::Unrecognized(tag) => tag,
        }
    }
}

/// A decoded envelope: transport metadata plus the typed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Producer-assigned event id (empty when the producer omitted it)
    pub id: String,
    /// When the producer emitted the event, if stated
    pub timestamp: Option<DateTime<Utc>>,
    /// The typed event
    pub event: LifecycleEvent,
}

/// Wire shape of the envelope, payload left unparsed.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    payload: Option<Box<RawValue>>,
}

impl EventEnvelope {
    /// Decode a raw message.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::Envelope`] if the bytes are not a valid envelope
    /// - [`DecodeError::MissingPayload`] if a `book.created` event has no payload
    /// - [`DecodeError::Payload`] if a `book.created` payload is malformed
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw: RawEnvelope =
            serde_json::from_slice(bytes).map_err(|e| DecodeError::Envelope(e.to_string()))?;

        let event = match raw.event_type.as_str() {
            BOOK_CREATED => LifecycleEvent::BookCreated(decode_payload(
                &raw.event_type,
                raw.payload.as_deref(),
            )?),
            BOOK_UPDATED => LifecycleEvent::BookUpdated,
            BOOK_DELETED => LifecycleEvent::BookDeleted,
            _ => LifecycleEvent::Unrecognized(raw.event_type),
        };

        Ok(Self {
            id: raw.id,
            timestamp: raw.timestamp,
            event,
        })
    }
}

fn decode_payload<T>(event_type: &str, payload: Option<&RawValue>) -> Result<T, DecodeError>
where
    T: for<'de> Deserialize<'de>,
{
    // `"payload": null` arrives as a raw `null` rather than `None`.
    let raw = payload
        .filter(|raw| raw.get() != "null")
        .ok_or_else(|| DecodeError::MissingPayload(event_type.to_string()))?;

    serde_json::from_str(raw.get()).map_err(|e| DecodeError::Payload {
        event_type: event_type.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    fn encode(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    #[test]
    fn decodes_book_created_payload() {
        let book_id = BookId::new();
        let bytes = encode(&json!({
            "id": "evt-1",
            "type": "book.created",
            "timestamp": "2025-01-01T12:00:00Z",
            "payload": {
                "book_id": book_id,
                "name": "Dune",
                "author": "Frank Herbert",
                "year": 1965,
                "genre": "sci-fi"
            }
        }));

        let envelope = EventEnvelope::decode(&bytes).unwrap();

        assert_eq!(envelope.id, "evt-1");
        assert!(envelope.timestamp.is_some());
        match envelope.event {
            LifecycleEvent::BookCreated(payload) => {
                assert_eq!(payload.book_id, book_id);
                assert_eq!(payload.year, Some(1965));
            }
            other => panic!("expected BookCreated, got {other:?}"),
        }
    }

    #[test]
    fn book_created_with_only_book_id_is_enough() {
        let book_id = BookId::new();
        let bytes = encode(&json!({
            "id": "evt-2",
            "type": "book.created",
            "timestamp": "2025-01-01T12:00:00Z",
            "payload": { "book_id": book_id }
        }));

        let envelope = EventEnvelope::decode(&bytes).unwrap();
        assert_eq!(
            envelope.event,
            LifecycleEvent::BookCreated(BookPayload {
                book_id,
                name: None,
                author: None,
                year: None,
                genre: None,
            })
        );
    }

    #[test]
    fn ignored_types_do_not_inspect_payload() {
        // The payload would not decode as a BookPayload, and it does not have to.
        let bytes = encode(&json!({
            "id": "evt-3",
            "type": "book.updated",
            "timestamp": "2025-01-01T12:00:00Z",
            "payload": "not an object"
        }));

        let envelope = EventEnvelope::decode(&bytes).unwrap();
        assert_eq!(envelope.event, LifecycleEvent::BookUpdated);
    }

    #[test]
    fn unknown_types_decode_to_unrecognized() {
        let bytes = encode(&json!({
            "id": "evt-4",
            "type": "author.created",
            "timestamp": "2025-01-01T12:00:00Z",
            "payload": {}
        }));

        let envelope = EventEnvelope::decode(&bytes).unwrap();
        assert_eq!(
            envelope.event,
            LifecycleEvent::Unrecognized("author.created".to_string())
        );
        assert_eq!(envelope.event.event_type(), "author.created");
    }

    #[test]
    fn missing_id_and_timestamp_are_tolerated() {
        let envelope = EventEnvelope::decode(br#"{"type":"book.deleted"}"#).unwrap();
        assert_eq!(envelope.id, "");
        assert_eq!(envelope.timestamp, None);
        assert_eq!(envelope.event, LifecycleEvent::BookDeleted);
    }

    #[test]
    fn malformed_envelope_is_rejected() {
        let err = EventEnvelope::decode(b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Envelope(_)));

        let err = EventEnvelope::decode(br#"{"id":"x"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Envelope(_)));
    }

    #[test]
    fn book_created_without_payload_is_rejected() {
        let err = EventEnvelope::decode(br#"{"type":"book.created"}"#).unwrap_err();
        assert_eq!(err, DecodeError::MissingPayload("book.created".to_string()));

        let err =
            EventEnvelope::decode(br#"{"type":"book.created","payload":null}"#).unwrap_err();
        assert_eq!(err, DecodeError::MissingPayload("book.created".to_string()));
    }

    #[test]
    fn book_created_with_bad_book_id_is_rejected() {
        let bytes = encode(&json!({
            "id": "evt-5",
            "type": "book.created",
            "timestamp": "2025-01-01T12:00:00Z",
            "payload": { "book_id": "not-a-uuid" }
        }));

        let err = EventEnvelope::decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Payload { ref event_type, .. } if event_type == "book.created"
        ));
    }
}
