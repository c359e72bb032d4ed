//! Rating business rules.
//!
//! [`RatingService`] is the only business caller of the repository. It owns the
//! uniqueness rule per `(book, user)`, the update and delete semantics, and the
//! bootstrap of newly announced books.
//!
//! # Uniqueness
//!
//! `create_rating` first looks the pair up and returns
//! [`RatingError::AlreadyExists`] without writing if a rating is present. That
//! lookup is only a fast path: two concurrent creates can both pass it, and the
//! store's unique constraint then rejects the second insert. The resulting
//! [`StoreError::UniqueViolation`] is reported as `AlreadyExists` as well.

use crate::handler::BookLifecycle;
use crate::metrics::RatingMetrics;
use async_trait::async_trait;
use ratings_core::environment::Clock;
use ratings_core::error::{RatingError, StoreError};
use ratings_core::repository::RatingRepository;
use ratings_core::types::{
    BookId, BookRatingStats, Rating, RatingId, RatingRequest, Score, UserId,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Orchestrates rating operations over a [`RatingRepository`].
///
/// Cloning is cheap; clones share the repository and clock.
#[derive(Clone)]
pub struct RatingService {
    repository: Arc<dyn RatingRepository>,
    clock: Arc<dyn Clock>,
}

fn outcome<T>(result: &Result<T, RatingError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(RatingError::NotFound(_)) => "not_found",
        Err(RatingError::AlreadyExists { .. }) => "conflict",
        Err(RatingError::InvalidScore(_)) => "invalid",
        Err(RatingError::Store { .. }) => "error",
    }
}

fn observe<T>(
    operation: &'static str,
    started: Instant,
    result: Result<T, RatingError>,
) -> Result<T, RatingError> {
    RatingMetrics::record_operation(operation, outcome(&result), started.elapsed());
    if let Err(RatingError::Store { source, .. }) = &result {
        warn!(operation, error = %source, "Rating store call failed");
    }
    result
}

impl RatingService {
    /// Create a service over the given repository and clock.
    #[must_use]
    pub fn new(repository: Arc<dyn RatingRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Record a new rating for `(book_id, user_id)`.
    ///
    /// # Errors
    ///
    /// - [`RatingError::InvalidScore`] if the score is outside `0..=10`
    /// - [`RatingError::AlreadyExists`] if the user already rated the book
    /// - [`RatingError::Store`] on any other storage failure
    #[instrument(skip(self, request), fields(book_id = %book_id, user_id = %user_id))]
    pub async fn create_rating(
        &self,
        book_id: BookId,
        user_id: UserId,
        request: RatingRequest,
    ) -> Result<Rating, RatingError> {
        let started = Instant::now();
        let result = self.try_create(book_id, user_id, request).await;
        observe("create_rating", started, result)
    }

    async fn try_create(
        &self,
        book_id: BookId,
        user_id: UserId,
        request: RatingRequest,
    ) -> Result<Rating, RatingError> {
        let score = Score::new(request.rating)?;

        match self.repository.get_by_book_and_user(book_id, user_id).await {
            Ok(_) => return Err(RatingError::AlreadyExists { book_id, user_id }),
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(RatingError::from_store("failed to check existing rating", e)),
        }

        let rating = Rating {
            id: RatingId::new(),
            book_id,
            user_id,
            rating: score,
            comment: request.comment,
            created_at: self.clock.now(),
        };

        match self.repository.create(rating).await {
            Ok(created) => {
                info!(rating_id = %created.id, score = %created.rating, "Rating created");
                Ok(created)
            }
            Err(StoreError::UniqueViolation(constraint)) => {
                debug!(%constraint, "Concurrent create lost the race");
                Err(RatingError::AlreadyExists { book_id, user_id })
            }
            Err(e) => Err(RatingError::from_store("failed to create rating", e)),
        }
    }

    /// Replace the score of an existing rating, and its comment when one is given.
    ///
    /// The rating keeps its id, book, user and creation time. A request without
    /// a comment leaves the stored comment in place.
    ///
    /// # Errors
    ///
    /// - [`RatingError::InvalidScore`] if the score is outside `0..=10`
    /// - [`RatingError::NotFound`] if the user has not rated the book
    /// - [`RatingError::Store`] on any other storage failure
    #[instrument(skip(self, request), fields(book_id = %book_id, user_id = %user_id))]
    pub async fn update_rating(
        &self,
        book_id: BookId,
        user_id: UserId,
        request: RatingRequest,
    ) -> Result<Rating, RatingError> {
        let started = Instant::now();
        let result = self.try_update(book_id, user_id, request).await;
        observe("update_rating", started, result)
    }

    async fn try_update(
        &self,
        book_id: BookId,
        user_id: UserId,
        request: RatingRequest,
    ) -> Result<Rating, RatingError> {
        let score = Score::new(request.rating)?;

        let existing = self
            .repository
            .get_by_book_and_user(book_id, user_id)
            .await
            .map_err(|e| RatingError::from_store("failed to get existing rating", e))?;

        // An omitted comment keeps the stored one.
        let comment = request.comment.or(existing.comment);

        let updated = self
            .repository
            .update(book_id, user_id, score, comment)
            .await
            .map_err(|e| RatingError::from_store("failed to update rating", e))?;

        info!(rating_id = %updated.id, score = %updated.rating, "Rating updated");
        Ok(updated)
    }

    /// The rating `user_id` gave `book_id`.
    ///
    /// # Errors
    ///
    /// - [`RatingError::NotFound`] if absent
    /// - [`RatingError::Store`] on any other storage failure
    #[instrument(skip(self), fields(book_id = %book_id, user_id = %user_id))]
    pub async fn get_rating(
        &self,
        book_id: BookId,
        user_id: UserId,
    ) -> Result<Rating, RatingError> {
        let started = Instant::now();
        let result = self
            .repository
            .get_by_book_and_user(book_id, user_id)
            .await
            .map_err(|e| RatingError::from_store("failed to get rating", e));
        observe("get_rating", started, result)
    }

    /// A rating by its identifier.
    ///
    /// # Errors
    ///
    /// - [`RatingError::NotFound`] if absent
    /// - [`RatingError::Store`] on any other storage failure
    #[instrument(skip(self), fields(rating_id = %id))]
    pub async fn get_rating_by_id(&self, id: RatingId) -> Result<Rating, RatingError> {
        let started = Instant::now();
        let result = self
            .repository
            .get_by_id(id)
            .await
            .map_err(|e| RatingError::from_store("failed to get rating", e));
        observe("get_rating_by_id", started, result)
    }

    /// Every rating of a book, highest score first.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError::Store`] on storage failure.
    #[instrument(skip(self), fields(book_id = %book_id))]
    pub async fn get_book_ratings(&self, book_id: BookId) -> Result<Vec<Rating>, RatingError> {
        let started = Instant::now();
        let result = self
            .repository
            .get_by_book_id(book_id)
            .await
            .map_err(|e| RatingError::from_store("failed to get book ratings", e));
        observe("get_book_ratings", started, result)
    }

    /// Average and count for one book.
    ///
    /// # Errors
    ///
    /// - [`RatingError::NotFound`] if the book is neither rated nor registered
    /// - [`RatingError::Store`] on any other storage failure
    #[instrument(skip(self), fields(book_id = %book_id))]
    pub async fn get_book_stats(&self, book_id: BookId) -> Result<BookRatingStats, RatingError> {
        let started = Instant::now();
        let result = self
            .repository
            .get_book_stats(book_id)
            .await
            .map_err(|e| RatingError::from_store("failed to get book stats", e));
        observe("get_book_stats", started, result)
    }

    /// Stats for every known book, highest average first.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError::Store`] on storage failure.
    #[instrument(skip(self))]
    pub async fn get_all_book_stats(&self) -> Result<Vec<BookRatingStats>, RatingError> {
        let started = Instant::now();
        let result = self
            .repository
            .get_all_book_stats()
            .await
            .map_err(|e| RatingError::from_store("failed to get all book stats", e));
        observe("get_all_book_stats", started, result)
    }

    /// Remove the rating `user_id` gave `book_id`.
    ///
    /// # Errors
    ///
    /// - [`RatingError::NotFound`] if absent
    /// - [`RatingError::Store`] on any other storage failure
    #[instrument(skip(self), fields(book_id = %book_id, user_id = %user_id))]
    pub async fn delete_rating(&self, book_id: BookId, user_id: UserId) -> Result<(), RatingError> {
        let started = Instant::now();
        let result = self
            .repository
            .delete(book_id, user_id)
            .await
            .map_err(|e| RatingError::from_store("failed to delete rating", e));
        if result.is_ok() {
            info!("Rating deleted");
        }
        observe("delete_rating", started, result)
    }

    /// Make a newly announced book visible in stats with zero ratings.
    ///
    /// Idempotent: repeated calls for the same book are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError::Store`] on storage failure.
    #[instrument(skip(self), fields(book_id = %book_id))]
    pub async fn handle_new_book(&self, book_id: BookId) -> Result<(), RatingError> {
        let started = Instant::now();
        let result = self
            .repository
            .init_empty_rating(book_id)
            .await
            .map_err(|e| {
                RatingError::from_store("failed to initialize empty rating for new book", e)
            });
        if result.is_ok() {
            info!("Book registered for ratings");
        }
        observe("handle_new_book", started, result)
    }

    /// Whether the rating store answers.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError::Store`] if the store is unreachable.
    pub async fn health_check(&self) -> Result<(), RatingError> {
        self.repository
            .health_check()
            .await
            .map_err(|e| RatingError::from_store("rating store unavailable", e))
    }
}

#[async_trait]
impl BookLifecycle for RatingService {
    async fn handle_new_book(&self, book_id: BookId) -> Result<(), RatingError> {
        Self::handle_new_book(self, book_id).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use ratings_testing::repository::ops;
    use ratings_testing::{InMemoryRatingRepository, test_clock};

    fn service() -> (RatingService, InMemoryRatingRepository) {
        let repository = InMemoryRatingRepository::new();
        let service = RatingService::new(Arc::new(repository.clone()), Arc::new(test_clock()));
        (service, repository)
    }

    fn request(score: i64) -> RatingRequest {
        RatingRequest::new(score, None::<String>)
    }

    #[tokio::test]
    async fn create_stamps_clock_time_and_fresh_id() {
        let (service, _) = service();
        let (book, user) = (BookId::new(), UserId::new());

        let rating = service
            .create_rating(book, user, RatingRequest::new(8, Some("loved it")))
            .await
            .unwrap();

        assert_eq!(rating.created_at, test_clock().now());
        assert!(!rating.id.is_nil());
        assert_eq!(rating.comment.as_deref(), Some("loved it"));
        assert_eq!(service.get_rating_by_id(rating.id).await.unwrap(), rating);
    }

    #[tokio::test]
    async fn invalid_score_writes_nothing() {
        let (service, repository) = service();

        let err = service
            .create_rating(BookId::new(), UserId::new(), request(11))
            .await
            .unwrap_err();

        assert!(matches!(err, RatingError::InvalidScore(11)));
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn store_unique_violation_is_reported_as_already_exists() {
        let (service, repository) = service();
        repository.fail_next(
            ops::CREATE,
            StoreError::UniqueViolation("ratings_book_user_key".into()),
        );

        let err = service
            .create_rating(BookId::new(), UserId::new(), request(5))
            .await
            .unwrap_err();

        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn precheck_failure_is_a_store_error_not_a_conflict() {
        let (service, repository) = service();
        repository.fail_next(
            ops::GET_BY_BOOK_AND_USER,
            StoreError::Database("connection reset".into()),
        );

        let err = service
            .create_rating(BookId::new(), UserId::new(), request(5))
            .await
            .unwrap_err();

        assert!(matches!(err, RatingError::Store { .. }));
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn update_with_invalid_score_leaves_rating_untouched() {
        let (service, _) = service();
        let (book, user) = (BookId::new(), UserId::new());
        service.create_rating(book, user, request(6)).await.unwrap();

        let err = service.update_rating(book, user, request(-1)).await.unwrap_err();

        assert!(matches!(err, RatingError::InvalidScore(-1)));
        assert_eq!(service.get_rating(book, user).await.unwrap().rating.value(), 6);
    }

    #[tokio::test]
    async fn health_check_reports_store_failures() {
        let (service, repository) = service();
        assert!(service.health_check().await.is_ok());

        repository.fail_next(ops::HEALTH_CHECK, StoreError::Database("down".into()));
        assert!(service.health_check().await.is_err());
    }
}
