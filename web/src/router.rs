//! Router configuration for the ratings API.

use crate::handlers::{health, ratings};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{Router, routing::get};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Health checks live at the root, rating endpoints under `/api`. Every
/// request is traced, tagged with a correlation ID and cut off after
/// `request_timeout` (answered with 408).
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let api_routes = Router::new()
        .route("/ratings/stats", get(ratings::list_all_stats))
        .route("/books/:book_id/ratings", get(ratings::list_book_ratings))
        .route("/books/:book_id/ratings/stats", get(ratings::get_book_stats))
        .route(
            "/books/:book_id/users/:user_id/ratings",
            get(ratings::get_rating)
                .post(ratings::create_rating)
                .put(ratings::update_rating)
                .delete(ratings::delete_rating),
        );

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
}
