//! Error taxonomy shared by the repository, the service and the boundaries.
//!
//! Two layers:
//!
//! - [`StoreError`] is what a [`RatingRepository`](crate::repository::RatingRepository)
//!   reports. Backends translate their own "no rows" and constraint signals into
//!   `NotFound` and `UniqueViolation`.
//! - [`RatingError`] is what the service reports. `NotFound` and `AlreadyExists`
//!   are forwarded as their own variants so callers can map them to specific
//!   statuses; every other store failure is wrapped with context and keeps the
//!   underlying [`StoreError`] as its source.

use crate::types::{BookId, UserId};
use thiserror::Error;

/// Errors reported by a rating repository.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Connectivity, query or decoding failure.
    #[error("database error: {0}")]
    Database(String),
}

/// Errors reported by the rating service.
#[derive(Error, Debug)]
pub enum RatingError {
    /// The requested rating or stats entry does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A rating already exists for this book and user.
    #[error("rating already exists for book {book_id} and user {user_id}")]
    AlreadyExists {
        /// Book of the conflicting rating
        book_id: BookId,
        /// User of the conflicting rating
        user_id: UserId,
    },

    /// The submitted score is outside `0..=10`.
    #[error("invalid rating {0}: must be between 0 and 10")]
    InvalidScore(i64),

    /// Any other storage failure, with the operation that hit it.
    #[error("{context}: {source}")]
    Store {
        /// What the service was doing
        context: &'static str,
        /// Underlying repository error
        source: StoreError,
    },
}

impl RatingError {
    /// Translate a repository error, keeping `NotFound` distinct.
    #[must_use]
    pub fn from_store(context: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            other => Self::Store {
                context,
                source: other,
            },
        }
    }

    /// Whether this error means "the thing you asked for is absent".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error is a uniqueness conflict on create.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// The underlying store error, if this is a wrapped storage failure.
    #[must_use]
    pub const fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn not_found_is_forwarded_verbatim() {
        let err = RatingError::from_store(
            "failed to get rating",
            StoreError::NotFound("rating".to_string()),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "rating not found");
    }

    #[test]
    fn database_errors_are_wrapped_with_context() {
        let err = RatingError::from_store(
            "failed to get book stats",
            StoreError::Database("connection refused".to_string()),
        );
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "failed to get book stats: database error: connection refused"
        );
        assert_eq!(
            err.store_error(),
            Some(&StoreError::Database("connection refused".to_string()))
        );
        assert!(err.source().is_some());
    }
}
