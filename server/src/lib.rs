//! Book ratings service process wiring.
//!
//! The binary in `main.rs` loads [`config::Config`], connects the rating
//! store and the event bus, starts the lifecycle consumer and serves the HTTP
//! API until SIGINT or SIGTERM.

pub mod config;
