//! Rating service behaviour against the in-memory repository.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use proptest::prelude::*;
use ratings_core::environment::SystemClock;
use ratings_core::error::RatingError;
use ratings_core::repository::RatingRepository;
use ratings_core::types::{BookId, Rating, RatingRequest, UserId};
use ratings_runtime::RatingService;
use ratings_testing::{InMemoryRatingRepository, test_clock};
use std::sync::Arc;

fn service_with(repository: &InMemoryRatingRepository) -> RatingService {
    RatingService::new(Arc::new(repository.clone()), Arc::new(SystemClock))
}

fn request(score: i64, comment: Option<&str>) -> RatingRequest {
    RatingRequest::new(score, comment)
}

#[tokio::test]
async fn created_rating_is_readable_with_submitted_fields() {
    let repository = InMemoryRatingRepository::new();
    let service = service_with(&repository);
    let (book, user) = (BookId::new(), UserId::new());
    let started = Utc::now();

    let created = service
        .create_rating(book, user, request(7, Some("solid")))
        .await
        .unwrap();
    let fetched = service.get_rating(book, user).await.unwrap();

    assert_eq!(fetched, created);
    assert_eq!(fetched.rating.value(), 7);
    assert_eq!(fetched.comment.as_deref(), Some("solid"));
    assert!(!fetched.id.is_nil());
    assert!(fetched.created_at >= started);
}

#[tokio::test]
async fn second_create_for_same_pair_is_rejected_and_store_unchanged() {
    let repository = InMemoryRatingRepository::new();
    let service = service_with(&repository);
    let (book, user) = (BookId::new(), UserId::new());

    let first = service
        .create_rating(book, user, request(4, None))
        .await
        .unwrap();
    let err = service
        .create_rating(book, user, request(9, Some("changed my mind")))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RatingError::AlreadyExists { book_id, user_id } if book_id == book && user_id == user
    ));
    assert_eq!(repository.get_by_book_id(book).await.unwrap(), vec![first]);
}

#[tokio::test]
async fn update_of_absent_rating_is_not_found() {
    let repository = InMemoryRatingRepository::new();
    let service = service_with(&repository);

    let err = service
        .update_rating(BookId::new(), UserId::new(), request(5, None))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(repository.is_empty());
}

#[tokio::test]
async fn update_overwrites_score_and_comment_only() {
    let repository = InMemoryRatingRepository::new();
    let service = service_with(&repository);
    let (book, user) = (BookId::new(), UserId::new());

    let created = service
        .create_rating(book, user, request(2, Some("slow start")))
        .await
        .unwrap();
    let updated = service
        .update_rating(book, user, request(9, Some("great ending")))
        .await
        .unwrap();

    let expected = Rating {
        rating: updated.rating,
        comment: Some("great ending".to_string()),
        ..created
    };
    assert_eq!(updated, expected);
    assert_eq!(service.get_rating(book, user).await.unwrap(), expected);
}

#[tokio::test]
async fn delete_removes_rating_and_second_delete_is_not_found() {
    let repository = InMemoryRatingRepository::new();
    let service = service_with(&repository);
    let (book, user) = (BookId::new(), UserId::new());

    let err = service.delete_rating(book, user).await.unwrap_err();
    assert!(err.is_not_found());

    service
        .create_rating(book, user, request(6, None))
        .await
        .unwrap();
    service.delete_rating(book, user).await.unwrap();

    assert!(service.get_rating(book, user).await.unwrap_err().is_not_found());
    assert!(service.delete_rating(book, user).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn rating_lifecycle_scenario() {
    let repository = InMemoryRatingRepository::new();
    let service = service_with(&repository);
    let (book, user) = (BookId::new(), UserId::new());

    let created = service
        .create_rating(book, user, request(8, Some("good")))
        .await
        .unwrap();
    assert_eq!(created.rating.value(), 8);
    assert_eq!(created.comment.as_deref(), Some("good"));
    assert_eq!((created.book_id, created.user_id), (book, user));

    let err = service
        .create_rating(book, user, request(8, Some("good")))
        .await
        .unwrap_err();
    assert!(err.is_already_exists());

    let updated = service
        .update_rating(book, user, request(3, None))
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.rating.value(), 3);
    assert_eq!(updated.comment.as_deref(), Some("good"));

    assert_eq!(service.get_rating(book, user).await.unwrap(), updated);

    service.delete_rating(book, user).await.unwrap();
    assert!(service.get_rating(book, user).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn update_with_new_comment_replaces_the_stored_one() {
    let repository = InMemoryRatingRepository::new();
    let service = service_with(&repository);
    let (book, user) = (BookId::new(), UserId::new());

    service
        .create_rating(book, user, request(6, Some("fine")))
        .await
        .unwrap();
    let updated = service
        .update_rating(book, user, request(7, Some("better on reread")))
        .await
        .unwrap();

    assert_eq!(updated.comment.as_deref(), Some("better on reread"));
}

#[tokio::test]
async fn book_ratings_are_listed_highest_score_first() {
    let repository = InMemoryRatingRepository::new();
    let service = service_with(&repository);
    let book = BookId::new();

    for score in [3, 10, 6] {
        service
            .create_rating(book, UserId::new(), request(score, None))
            .await
            .unwrap();
    }

    let scores: Vec<i16> = service
        .get_book_ratings(book)
        .await
        .unwrap()
        .iter()
        .map(|r| r.rating.value())
        .collect();
    assert_eq!(scores, vec![10, 6, 3]);
}

#[tokio::test]
async fn new_book_shows_up_in_stats_once_even_if_announced_twice() {
    let repository = InMemoryRatingRepository::new();
    let service = service_with(&repository);
    let book = BookId::new();

    assert!(service.get_book_stats(book).await.unwrap_err().is_not_found());

    service.handle_new_book(book).await.unwrap();
    service.handle_new_book(book).await.unwrap();

    let stats = service.get_book_stats(book).await.unwrap();
    assert_eq!(stats.rating_count, 0);
    assert!(stats.average_rating.abs() < f64::EPSILON);

    let all = service.get_all_book_stats().await.unwrap();
    assert_eq!(all.iter().filter(|s| s.book_id == book).count(), 1);
}

#[tokio::test]
async fn fixed_clock_stamps_creation_time() {
    let repository = InMemoryRatingRepository::new();
    let service = RatingService::new(Arc::new(repository.clone()), Arc::new(test_clock()));

    let created = service
        .create_rating(BookId::new(), UserId::new(), request(5, None))
        .await
        .unwrap();

    assert_eq!(created.created_at.to_rfc3339(), "2025-01-01T00:00:00+00:00");
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn stats_match_committed_ratings(scores in prop::collection::vec(0i64..=10, 1..20)) {
        let (count, average) = block_on(async {
            let repository = InMemoryRatingRepository::new();
            let service = service_with(&repository);
            let book = BookId::new();

            for score in &scores {
                service
                    .create_rating(book, UserId::new(), request(*score, None))
                    .await
                    .unwrap();
            }

            let stats = service.get_book_stats(book).await.unwrap();
            (stats.rating_count, stats.average_rating)
        });

        #[allow(clippy::cast_precision_loss)]
        let expected = scores.iter().sum::<i64>() as f64 / scores.len() as f64;
        prop_assert_eq!(count, i64::try_from(scores.len()).unwrap());
        prop_assert!((average - expected).abs() < 1e-9);
    }

    #[test]
    fn all_stats_are_non_ascending(
        book_scores in prop::collection::vec(prop::collection::vec(0i64..=10, 0..5), 1..8),
    ) {
        let averages = block_on(async {
            let repository = InMemoryRatingRepository::new();
            let service = service_with(&repository);

            for scores in &book_scores {
                let book = BookId::new();
                service.handle_new_book(book).await.unwrap();
                for score in scores {
                    service
                        .create_rating(book, UserId::new(), request(*score, None))
                        .await
                        .unwrap();
                }
            }

            service
                .get_all_book_stats()
                .await
                .unwrap()
                .iter()
                .map(|s| s.average_rating)
                .collect::<Vec<f64>>()
        });

        prop_assert_eq!(averages.len(), book_scores.len());
        prop_assert!(averages.windows(2).all(|w| w[0] >= w[1]));
    }
}
