//! HTTP request handlers.

pub mod health;
pub mod ratings;

pub use health::{health_check, readiness_check};
