//! HTTP API for the book ratings service.
//!
//! A thin Axum shell over [`RatingService`](ratings_runtime::RatingService):
//! handlers parse path ids and JSON bodies, call the service, and map
//! [`RatingError`](ratings_core::error::RatingError) to a status through
//! [`AppError`].
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives, gets a correlation ID and a trace span
//! 2. **Extract** path ids (malformed → 400) and the JSON body (malformed → 400)
//! 3. **Call** the rating service
//! 4. **Map** the result: success status, or `{code, message}` error JSON
//!
//! # Example
//!
//! ```ignore
//! use ratings_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(service), Duration::from_secs(10));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::AppError;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlation_id_layer};
pub use router::build_router;
pub use state::AppState;
