//! # Ratings Testing
//!
//! Testing utilities and helpers for the book ratings service.
//!
//! This crate provides:
//! - [`InMemoryRatingRepository`]: a `HashMap`-backed repository with the same
//!   uniqueness and ordering contract as the SQL store, plus failure injection
//! - [`InMemoryEventBus`]: a channel-backed bus that feeds published messages to
//!   live subscriptions
//! - [`FixedClock`] / [`test_clock`]: deterministic time
//! - [`init_test_tracing`]: opt-in log output for a test run
//!
//! ## Example
//!
//! ```
//! use ratings_core::repository::RatingRepository;
//! use ratings_core::types::BookId;
//! use ratings_testing::InMemoryRatingRepository;
//!
//! # tokio_test_block_on(async {
//! let repository = InMemoryRatingRepository::new();
//! let book = BookId::new();
//!
//! repository.init_empty_rating(book).await.unwrap();
//! let stats = repository.get_book_stats(book).await.unwrap();
//! assert_eq!(stats.rating_count, 0);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use chrono::{DateTime, Utc};
use ratings_core::environment::Clock;

pub mod event_bus;
pub mod repository;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ratings_testing::mocks::FixedClock;
    /// use ratings_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a fmt subscriber honouring `RUST_LOG`, once per test binary.
///
/// Safe to call from every test; only the first call has an effect.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use event_bus::InMemoryEventBus;
pub use mocks::{FixedClock, test_clock};
pub use repository::InMemoryRatingRepository;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn init_test_tracing_is_reentrant() {
        init_test_tracing();
        init_test_tracing();
    }
}
