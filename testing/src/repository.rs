//! In-memory rating repository for fast, deterministic tests.
//!
//! Mirrors the SQL store's contract: one rating per `(book, user)` enforced at
//! insert time, stats derived on read from the stored rows plus the registry of
//! announced books, and the same orderings.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use ratings_core::error::StoreError;
use ratings_core::repository::{RatingRepository, RepositoryFuture};
use ratings_core::types::{BookId, BookRatingStats, Rating, RatingId, Score, UserId};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

/// Repository operation names accepted by
/// [`InMemoryRatingRepository::fail_next`].
pub mod ops {
    /// `create`
    pub const CREATE: &str = "create";
    /// `update`
    pub const UPDATE: &str = "update";
    /// `get_by_id`
    pub const GET_BY_ID: &str = "get_by_id";
    /// `get_by_book_and_user`
    pub const GET_BY_BOOK_AND_USER: &str = "get_by_book_and_user";
    /// `get_by_book_id`
    pub const GET_BY_BOOK_ID: &str = "get_by_book_id";
    /// `get_book_stats`
    pub const GET_BOOK_STATS: &str = "get_book_stats";
    /// `get_all_book_stats`
    pub const GET_ALL_BOOK_STATS: &str = "get_all_book_stats";
    /// `delete`
    pub const DELETE: &str = "delete";
    /// `init_empty_rating`
    pub const INIT_EMPTY_RATING: &str = "init_empty_rating";
    /// `health_check`
    pub const HEALTH_CHECK: &str = "health_check";
}

#[derive(Debug, Default)]
struct State {
    ratings: HashMap<RatingId, Rating>,
    registered_books: BTreeSet<BookId>,
    failures: HashMap<&'static str, StoreError>,
}

impl State {
    fn find(&self, book_id: BookId, user_id: UserId) -> Option<&Rating> {
        self.ratings
            .values()
            .find(|r| r.book_id == book_id && r.user_id == user_id)
    }

    fn take_failure(&mut self, op: &str) -> Result<(), StoreError> {
        self.failures.remove(op).map_or(Ok(()), Err)
    }

    #[allow(clippy::cast_precision_loss)] // Counts are tiny in tests
    fn stats_for(&self, book_id: BookId) -> Option<BookRatingStats> {
        let scores: Vec<i16> = self
            .ratings
            .values()
            .filter(|r| r.book_id == book_id)
            .map(|r| r.rating.value())
            .collect();

        if scores.is_empty() && !self.registered_books.contains(&book_id) {
            return None;
        }

        let count = scores.len();
        let average = if count == 0 {
            0.0
        } else {
            scores.iter().map(|s| f64::from(*s)).sum::<f64>() / count as f64
        };

        Some(BookRatingStats {
            book_id,
            average_rating: average,
            rating_count: i64::try_from(count).unwrap(),
        })
    }
}

/// `HashMap`-backed [`RatingRepository`].
///
/// Cloning shares the underlying state, so a test can keep a handle for
/// assertions while the service owns another.
///
/// # Example
///
/// ```
/// use ratings_core::error::StoreError;
/// use ratings_testing::InMemoryRatingRepository;
/// use ratings_testing::repository::ops;
///
/// let repository = InMemoryRatingRepository::new();
/// repository.fail_next(ops::CREATE, StoreError::Database("disk full".into()));
/// assert!(repository.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryRatingRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryRatingRepository {
    /// Create a new empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `operation` fail with `error`.
    ///
    /// The failure is consumed by that call; later calls behave normally.
    pub fn fail_next(&self, operation: &'static str, error: StoreError) {
        self.state.write().unwrap().failures.insert(operation, error);
    }

    /// Insert a rating directly, bypassing the uniqueness check.
    ///
    /// Lets a test stage a row "behind the service's back", for example to
    /// simulate a concurrent writer.
    pub fn insert_raw(&self, rating: Rating) {
        self.state
            .write()
            .unwrap()
            .ratings
            .insert(rating.id, rating);
    }

    /// Number of stored ratings
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().unwrap().ratings.len()
    }

    /// Whether no ratings are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().unwrap().ratings.is_empty()
    }

    /// Whether the book was registered through `init_empty_rating`
    #[must_use]
    pub fn is_registered(&self, book_id: BookId) -> bool {
        self.state
            .read()
            .unwrap()
            .registered_books
            .contains(&book_id)
    }

    /// Number of books registered through `init_empty_rating`
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.state.read().unwrap().registered_books.len()
    }
}

fn not_found() -> StoreError {
    StoreError::NotFound("rating".to_string())
}

impl RatingRepository for InMemoryRatingRepository {
    fn create(&self, rating: Rating) -> RepositoryFuture<'_, Rating> {
        Box::pin(async move {
            let mut state = self.state.write().unwrap();
            state.take_failure(ops::CREATE)?;

            // Check and insert under one write lock, like the table constraint.
            if state.find(rating.book_id, rating.user_id).is_some() {
                return Err(StoreError::UniqueViolation(
                    "ratings_book_user_key".to_string(),
                ));
            }

            let mut rating = rating;
            if rating.id.is_nil() {
                rating.id = RatingId::new();
            }
            state.ratings.insert(rating.id, rating.clone());
            Ok(rating)
        })
    }

    fn update(
        &self,
        book_id: BookId,
        user_id: UserId,
        score: Score,
        comment: Option<String>,
    ) -> RepositoryFuture<'_, Rating> {
        Box::pin(async move {
            let mut state = self.state.write().unwrap();
            state.take_failure(ops::UPDATE)?;

            let stored = state
                .ratings
                .values_mut()
                .find(|r| r.book_id == book_id && r.user_id == user_id)
                .ok_or_else(not_found)?;
            stored.rating = score;
            stored.comment = comment;
            Ok(stored.clone())
        })
    }

    fn get_by_id(&self, id: RatingId) -> RepositoryFuture<'_, Rating> {
        Box::pin(async move {
            let mut state = self.state.write().unwrap();
            state.take_failure(ops::GET_BY_ID)?;
            state.ratings.get(&id).cloned().ok_or_else(not_found)
        })
    }

    fn get_by_book_and_user(
        &self,
        book_id: BookId,
        user_id: UserId,
    ) -> RepositoryFuture<'_, Rating> {
        Box::pin(async move {
            let mut state = self.state.write().unwrap();
            state.take_failure(ops::GET_BY_BOOK_AND_USER)?;
            state.find(book_id, user_id).cloned().ok_or_else(not_found)
        })
    }

    fn get_by_book_id(&self, book_id: BookId) -> RepositoryFuture<'_, Vec<Rating>> {
        Box::pin(async move {
            let mut state = self.state.write().unwrap();
            state.take_failure(ops::GET_BY_BOOK_ID)?;

            let mut ratings: Vec<Rating> = state
                .ratings
                .values()
                .filter(|r| r.book_id == book_id)
                .cloned()
                .collect();
            // HashMap order is random; pin ties so tests are repeatable.
            ratings.sort_by(|a, b| b.rating.cmp(&a.rating).then(a.id.cmp(&b.id)));
            Ok(ratings)
        })
    }

    fn get_book_stats(&self, book_id: BookId) -> RepositoryFuture<'_, BookRatingStats> {
        Box::pin(async move {
            let mut state = self.state.write().unwrap();
            state.take_failure(ops::GET_BOOK_STATS)?;
            state
                .stats_for(book_id)
                .ok_or_else(|| StoreError::NotFound("book stats".to_string()))
        })
    }

    fn get_all_book_stats(&self) -> RepositoryFuture<'_, Vec<BookRatingStats>> {
        Box::pin(async move {
            let mut state = self.state.write().unwrap();
            state.take_failure(ops::GET_ALL_BOOK_STATS)?;

            let books: BTreeSet<BookId> = state
                .ratings
                .values()
                .map(|r| r.book_id)
                .chain(state.registered_books.iter().copied())
                .collect();

            let mut stats: Vec<BookRatingStats> =
                books.into_iter().filter_map(|b| state.stats_for(b)).collect();
            stats.sort_by(|a, b| b.average_rating.total_cmp(&a.average_rating));
            Ok(stats)
        })
    }

    fn delete(&self, book_id: BookId, user_id: UserId) -> RepositoryFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.write().unwrap();
            state.take_failure(ops::DELETE)?;

            let id = state.find(book_id, user_id).map(|r| r.id).ok_or_else(not_found)?;
            state.ratings.remove(&id);
            Ok(())
        })
    }

    fn init_empty_rating(&self, book_id: BookId) -> RepositoryFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.write().unwrap();
            state.take_failure(ops::INIT_EMPTY_RATING)?;
            state.registered_books.insert(book_id);
            Ok(())
        })
    }

    fn health_check(&self) -> RepositoryFuture<'_, ()> {
        Box::pin(async move { self.state.write().unwrap().take_failure(ops::HEALTH_CHECK) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_clock;
    use ratings_core::environment::Clock;

    fn rating(book_id: BookId, user_id: UserId, score: i64) -> Rating {
        Rating {
            id: RatingId::new(),
            book_id,
            user_id,
            rating: Score::new(score).unwrap(),
            comment: None,
            created_at: test_clock().now(),
        }
    }

    #[tokio::test]
    async fn duplicate_pair_is_rejected() {
        let repo = InMemoryRatingRepository::new();
        let (book, user) = (BookId::new(), UserId::new());

        repo.create(rating(book, user, 5)).await.unwrap();
        let err = repo.create(rating(book, user, 6)).await.unwrap_err();

        assert!(matches!(err, StoreError::UniqueViolation(_)));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn stats_cover_registered_and_rated_books() {
        let repo = InMemoryRatingRepository::new();
        let (rated, announced) = (BookId::new(), BookId::new());

        repo.create(rating(rated, UserId::new(), 6)).await.unwrap();
        repo.create(rating(rated, UserId::new(), 9)).await.unwrap();
        repo.init_empty_rating(announced).await.unwrap();

        let all = repo.get_all_book_stats().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].book_id, rated);
        assert!((all[0].average_rating - 7.5).abs() < f64::EPSILON);
        assert_eq!(all[1], BookRatingStats::empty(announced));
    }

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let repo = InMemoryRatingRepository::new();
        repo.fail_next(ops::HEALTH_CHECK, StoreError::Database("down".into()));

        assert!(repo.health_check().await.is_err());
        assert!(repo.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn unknown_book_has_no_stats() {
        let repo = InMemoryRatingRepository::new();
        let err = repo.get_book_stats(BookId::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
