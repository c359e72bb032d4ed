//! # Ratings Runtime
//!
//! Business logic and background processing for the book ratings service.
//!
//! - [`service`]: [`RatingService`], the rules for creating, updating and
//!   deleting ratings and for bootstrapping new books
//! - [`handler`]: decoding and dispatch of one lifecycle message
//! - [`consumer`]: the sequential subscribe-process-reconnect loop
//! - [`metrics`]: Prometheus counters and the exporter
//!
//! ## Example
//!
//! ```rust,ignore
//! use ratings_runtime::{EventConsumer, LifecycleEventHandler, RatingService};
//!
//! let service = Arc::new(RatingService::new(repository, Arc::new(SystemClock)));
//! let handler = Arc::new(LifecycleEventHandler::new(service.clone()));
//! let consumer = EventConsumer::new("book-lifecycle", topics, event_bus, handler, shutdown_rx);
//! let handle = consumer.spawn();
//! ```

pub mod consumer;
pub mod handler;
pub mod metrics;
pub mod service;

pub use consumer::EventConsumer;
pub use handler::{BookLifecycle, EventHandler, HandlerError, LifecycleEventHandler};
pub use service::RatingService;
