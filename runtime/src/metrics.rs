//! Prometheus metrics for the rating service.
//!
//! Two counter families are exported:
//!
//! - `ratings_operations_total{operation, outcome}`: every service call
//! - `ratings_events_total{event_type, outcome}`: every consumed lifecycle event
//!
//! plus a latency histogram per service operation.
//!
//! # Example
//!
//! ```rust,no_run
//! use ratings_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
}

/// Prometheus metrics server.
///
/// Installs the global recorder and exposes `/metrics` on `addr` for scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the recorder and start the HTTP exporter.
    ///
    /// Must be called from within a tokio runtime: the exporter runs as a
    /// spawned task.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the exporter cannot be built (for
    /// example because the listener address is invalid).
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests) the call logs a
    /// warning and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = recorder.handle();
        if metrics::set_global_recorder(recorder).is_err() {
            tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
            return Ok(());
        }

        tokio::spawn(async move {
            if exporter.await.is_err() {
                tracing::error!("Metrics exporter stopped");
            }
        });

        tracing::info!(
            addr = %self.addr,
            "Metrics server started - available at http://{}/metrics",
            self.addr
        );
        self.handle = Some(handle);
        Ok(())
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "ratings_operations_total",
        "Rating service calls by operation and outcome"
    );
    describe_histogram!(
        "ratings_operation_duration_seconds",
        "Time taken by rating service calls"
    );
    describe_counter!(
        "ratings_events_total",
        "Lifecycle events consumed by type and outcome"
    );
}

/// Rating service metrics recorder.
pub struct RatingMetrics;

impl RatingMetrics {
    /// Record one service call.
    pub fn record_operation(operation: &'static str, outcome: &'static str, duration: Duration) {
        counter!(
            "ratings_operations_total",
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
        histogram!("ratings_operation_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }
}

/// Lifecycle event metrics recorder.
pub struct EventMetrics;

impl EventMetrics {
    /// Record one consumed event.
    pub fn record_event(event_type: &str, outcome: &'static str) {
        counter!(
            "ratings_events_total",
            "event_type" => event_type.to_string(),
            "outcome" => outcome
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[tokio::test]
    async fn test_metrics_server_render() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        server.start().unwrap();

        RatingMetrics::record_operation("create_rating", "success", Duration::from_millis(3));
        EventMetrics::record_event("book.created", "applied");

        // If another test installed the recorder first, this instance has no
        // handle. Metrics are still recorded globally.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("ratings_operations_total"));
            assert!(rendered.contains("ratings_events_total"));
        }
    }
}
