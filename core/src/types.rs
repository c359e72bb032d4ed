//! Domain types for the book ratings service.
//!
//! Identifiers are `Copy` newtypes over [`Uuid`] so that a book id can never be
//! passed where a user id is expected. Scores are validated once, at the edge,
//! into [`Score`]; everything past that point can rely on the 0..=10 range.

use crate::error::RatingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Whether this is the all-zero UUID.
            #[must_use]
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a book (owned by the catalogue service)
    BookId
);

define_id!(
    /// Unique identifier for a user
    UserId
);

define_id!(
    /// Unique identifier for a stored rating
    RatingId
);

// ============================================================================
// Score
// ============================================================================

/// A rating score, guaranteed to lie in `0..=10`.
///
/// # Example
///
/// ```
/// use ratings_core::types::Score;
///
/// assert_eq!(Score::new(0).map(|s| s.value()).ok(), Some(0));
/// assert_eq!(Score::new(10).map(|s| s.value()).ok(), Some(10));
/// assert!(Score::new(-1).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i16")]
pub struct Score(i16);

impl Score {
    /// Lowest accepted score.
    pub const MIN: i16 = 0;
    /// Highest accepted score.
    pub const MAX: i16 = 10;

    /// Validate a raw score.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError::InvalidScore`] if `value` is outside `0..=10`.
    pub fn new(value: i64) -> Result<Self, RatingError> {
        i16::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
            .ok_or(RatingError::InvalidScore(value))
    }

    /// The raw score value.
    #[must_use]
    pub const fn value(self) -> i16 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = RatingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for i16 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A single user's score and optional comment for one book.
///
/// At most one `Rating` exists per `(book_id, user_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    /// Generated identifier
    pub id: RatingId,
    /// Rated book
    pub book_id: BookId,
    /// Author of the rating
    pub user_id: UserId,
    /// Score in `0..=10`
    pub rating: Score,
    /// Optional free-text comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// When the rating was first submitted
    pub created_at: DateTime<Utc>,
}

/// Derived aggregate over all ratings of one book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRatingStats {
    /// The book these statistics describe
    pub book_id: BookId,
    /// Mean score, `0.0` when the book has no ratings yet
    pub average_rating: f64,
    /// Number of ratings
    pub rating_count: i64,
}

impl BookRatingStats {
    /// Stats for a book that is known but not rated yet.
    #[must_use]
    pub const fn empty(book_id: BookId) -> Self {
        Self {
            book_id,
            average_rating: 0.0,
            rating_count: 0,
        }
    }
}

/// Body of a create or update request.
///
/// The score is kept raw here; [`Score::new`] validates it inside the service so
/// that an out-of-range score is a domain error rather than a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRequest {
    /// Requested score (validated against `0..=10`)
    pub rating: i64,
    /// Optional comment
    #[serde(default)]
    pub comment: Option<String>,
}

impl RatingRequest {
    /// Build a request.
    #[must_use]
    pub fn new(rating: i64, comment: Option<impl Into<String>>) -> Self {
        Self {
            rating,
            comment: comment.map(Into::into),
        }
    }
}
