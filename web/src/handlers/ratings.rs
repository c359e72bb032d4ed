//! Rating endpoints.
//!
//! - `GET    /api/ratings/stats` - Stats for every known book
//! - `GET    /api/books/:book_id/ratings` - All ratings of a book, highest first
//! - `GET    /api/books/:book_id/ratings/stats` - Stats for one book
//! - `POST   /api/books/:book_id/users/:user_id/ratings` - Create a rating
//! - `GET    /api/books/:book_id/users/:user_id/ratings` - Get a rating
//! - `PUT    /api/books/:book_id/users/:user_id/ratings` - Update a rating
//! - `DELETE /api/books/:book_id/users/:user_id/ratings` - Delete a rating

use crate::error::AppError;
use crate::middleware::CorrelationId;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use ratings_core::types::{BookId, BookRatingStats, Rating, RatingRequest, UserId};
use uuid::Uuid;

fn parse_uuid(name: &str, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request(format!("invalid {name}: {raw}")))
}

fn parse_book(raw: &str) -> Result<BookId, AppError> {
    parse_uuid("book_id", raw).map(BookId::from_uuid)
}

fn parse_pair(book: &str, user: &str) -> Result<(BookId, UserId), AppError> {
    Ok((
        parse_book(book)?,
        parse_uuid("user_id", user).map(UserId::from_uuid)?,
    ))
}

// ============================================================================
// Per-book
// ============================================================================

/// List all ratings of a book.
///
/// # Errors
///
/// 400 for a malformed book id, 500 on store failure.
pub async fn list_book_ratings(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<Json<Vec<Rating>>, AppError> {
    let book_id = parse_book(&book_id)?;
    Ok(Json(state.service.get_book_ratings(book_id).await?))
}

/// Stats for one book.
///
/// # Errors
///
/// 400 for a malformed book id, 404 for an unknown book.
pub async fn get_book_stats(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<Json<BookRatingStats>, AppError> {
    let book_id = parse_book(&book_id)?;
    Ok(Json(state.service.get_book_stats(book_id).await?))
}

/// Stats for every known book, highest average first.
///
/// # Errors
///
/// 500 on store failure.
pub async fn list_all_stats(
    State(state): State<AppState>,
) -> Result<Json<Vec<BookRatingStats>>, AppError> {
    Ok(Json(state.service.get_all_book_stats().await?))
}

// ============================================================================
// Per (book, user)
// ============================================================================

/// Create a rating.
///
/// # Errors
///
/// 400 for malformed ids or body, 409 if the user already rated the book,
/// 422 for a score outside `0..=10`.
pub async fn create_rating(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Path((book_id, user_id)): Path<(String, String)>,
    body: Result<Json<RatingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Rating>), AppError> {
    let (book_id, user_id) = parse_pair(&book_id, &user_id)?;
    let Json(request) = body?;

    let rating = state
        .service
        .create_rating(book_id, user_id, request)
        .await?;

    tracing::info!(
        correlation_id = %correlation_id.0,
        rating_id = %rating.id,
        book_id = %book_id,
        "Rating created"
    );

    Ok((StatusCode::CREATED, Json(rating)))
}

/// Get the rating a user gave a book.
///
/// # Errors
///
/// 400 for malformed ids, 404 if there is no such rating.
pub async fn get_rating(
    State(state): State<AppState>,
    Path((book_id, user_id)): Path<(String, String)>,
) -> Result<Json<Rating>, AppError> {
    let (book_id, user_id) = parse_pair(&book_id, &user_id)?;
    Ok(Json(state.service.get_rating(book_id, user_id).await?))
}

/// Replace the score of an existing rating, and its comment when the body has one.
///
/// # Errors
///
/// 400 for malformed ids or body, 404 if there is no such rating, 422 for a
/// score outside `0..=10`.
pub async fn update_rating(
    State(state): State<AppState>,
    Path((book_id, user_id)): Path<(String, String)>,
    body: Result<Json<RatingRequest>, JsonRejection>,
) -> Result<Json<Rating>, AppError> {
    let (book_id, user_id) = parse_pair(&book_id, &user_id)?;
    let Json(request) = body?;

    Ok(Json(
        state
            .service
            .update_rating(book_id, user_id, request)
            .await?,
    ))
}

/// Delete a rating.
///
/// # Errors
///
/// 400 for malformed ids, 404 if there is no such rating.
pub async fn delete_rating(
    State(state): State<AppState>,
    Path((book_id, user_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let (book_id, user_id) = parse_pair(&book_id, &user_id)?;
    state.service.delete_rating(book_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
