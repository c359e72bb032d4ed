//! # Ratings Core
//!
//! Core types and contracts for the book ratings service.
//!
//! This crate owns everything the other crates agree on:
//!
//! - **Domain types**: [`Rating`](types::Rating), [`BookRatingStats`](types::BookRatingStats),
//!   identifier newtypes and the validated [`Score`](types::Score)
//! - **Errors**: the [`StoreError`](error::StoreError) / [`RatingError`](error::RatingError)
//!   taxonomy shared by the repository, the service and the HTTP boundary
//! - **Repository contract**: the [`RatingRepository`](repository::RatingRepository) trait
//!   implemented by the `PostgreSQL` store and the in-memory test store
//! - **Lifecycle events**: tagged decoding of the inbound book event envelope
//! - **Event bus contract**: the transport seam the consumer reads from
//!
//! ## Architecture
//!
//! ```text
//! lifecycle event ──► EventBus ──► consumer ──► RatingService ──┐
//!                                                              ├──► RatingRepository ──► store
//! HTTP request ──────────────────► handler ───► RatingService ──┘
//! ```
//!
//! ## Example
//!
//! ```
//! use ratings_core::types::{BookId, Score, UserId};
//!
//! let score = Score::new(8).expect("8 is in range");
//! assert_eq!(score.value(), 8);
//! assert!(Score::new(11).is_err());
//!
//! let book = BookId::new();
//! let user = UserId::new();
//! assert_ne!(book.as_uuid(), user.as_uuid());
//! ```

pub mod error;
pub mod event;
pub mod event_bus;
pub mod repository;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::{RatingError, StoreError};
pub use repository::RatingRepository;
pub use types::{BookId, BookRatingStats, Rating, RatingId, RatingRequest, Score, UserId};

/// Environment module - injected dependencies
///
/// All ambient inputs of the service (currently only time) are abstracted behind
/// traits so that tests can pin them.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use ratings_core::environment::{Clock, SystemClock};
    ///
    /// let before = chrono::Utc::now();
    /// let now = SystemClock.now();
    /// assert!(now >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_moves_forward() {
        let first = SystemClock.now();
        let second = SystemClock.now();
        assert!(second >= first);
    }
}
