//! Repository contract for rating storage.
//!
//! # Implementations
//!
//! - `PostgresRatingRepository` (in `ratings-postgres`): production implementation
//! - `InMemoryRatingRepository` (in `ratings-testing`): fast, deterministic tests
//!
//! # Cancellation
//!
//! Every operation returns a future. Dropping it (for example because a request
//! timed out or the client disconnected) aborts the in-flight query.
//!
//! # Dyn Compatibility
//!
//! This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
//! so it can be shared as `Arc<dyn RatingRepository>` between the HTTP handlers
//! and the event consumer.

use crate::error::StoreError;
use crate::types::{BookId, BookRatingStats, Rating, RatingId, Score, UserId};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by every repository operation.
pub type RepositoryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Typed access to rating rows and the derived per-book statistics.
///
/// The repository is the only path that mutates stored ratings. Statistics are
/// derived by the store itself, so a committed create, update or delete is
/// visible in the next [`get_book_stats`](Self::get_book_stats) call.
pub trait RatingRepository: Send + Sync {
    /// Insert a new rating.
    ///
    /// A nil `rating.id` is replaced with a freshly generated one. Returns the
    /// row as stored.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UniqueViolation`] if a rating already exists for the pair
    /// - [`StoreError::Database`] on connectivity or query failure
    fn create(&self, rating: Rating) -> RepositoryFuture<'_, Rating>;

    /// Overwrite score and comment of the rating for `(book_id, user_id)`.
    ///
    /// Returns the updated row.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if no rating exists for the pair
    /// - [`StoreError::Database`] on connectivity or query failure
    fn update(
        &self,
        book_id: BookId,
        user_id: UserId,
        score: Score,
        comment: Option<String>,
    ) -> RepositoryFuture<'_, Rating>;

    /// Load a rating by its identifier.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if absent
    /// - [`StoreError::Database`] on connectivity or query failure
    fn get_by_id(&self, id: RatingId) -> RepositoryFuture<'_, Rating>;

    /// Load the rating for `(book_id, user_id)`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if absent
    /// - [`StoreError::Database`] on connectivity or query failure
    fn get_by_book_and_user(&self, book_id: BookId, user_id: UserId)
    -> RepositoryFuture<'_, Rating>;

    /// All ratings of a book, highest score first.
    ///
    /// The relative order of equal scores is unspecified.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on connectivity or query failure.
    fn get_by_book_id(&self, book_id: BookId) -> RepositoryFuture<'_, Vec<Rating>>;

    /// Aggregate statistics for one book.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the book has neither ratings nor a bootstrap entry
    /// - [`StoreError::Database`] on connectivity or query failure
    fn get_book_stats(&self, book_id: BookId) -> RepositoryFuture<'_, BookRatingStats>;

    /// Statistics for every known book, highest average first.
    ///
    /// The relative order of equal averages is unspecified.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on connectivity or query failure.
    fn get_all_book_stats(&self) -> RepositoryFuture<'_, Vec<BookRatingStats>>;

    /// Remove the rating for `(book_id, user_id)`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if no row was affected
    /// - [`StoreError::Database`] on connectivity or query failure
    fn delete(&self, book_id: BookId, user_id: UserId) -> RepositoryFuture<'_, ()>;

    /// Make a newly announced book visible to stats queries with zero ratings.
    ///
    /// Must be idempotent: calling it again for the same book is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on connectivity or query failure.
    fn init_empty_rating(&self, book_id: BookId) -> RepositoryFuture<'_, ()>;

    /// Cheap round trip used by the readiness endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the store is unreachable.
    fn health_check(&self) -> RepositoryFuture<'_, ()>;
}
