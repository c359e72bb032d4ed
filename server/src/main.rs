//! Book ratings HTTP server.
//!
//! Serves the ratings API and consumes book lifecycle events so that newly
//! created books show up in the stats before anyone rates them.

use anyhow::Context;
use ratings_core::environment::SystemClock;
use ratings_core::event_bus::EventBus;
use ratings_postgres::PostgresRatingRepository;
use ratings_redpanda::RedpandaEventBus;
use ratings_runtime::metrics::MetricsServer;
use ratings_runtime::{EventConsumer, LifecycleEventHandler, RatingService};
use ratings_server::config::Config;
use ratings_web::{AppState, build_router};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ratings_server=info,ratings_runtime=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting book ratings service");

    if let Err(e) = run().await {
        error!(error = ?e, "Ratings service failed");
        return Err(e);
    }

    info!("Ratings service stopped");
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env();
    info!(
        kafka_brokers = %config.kafka.brokers,
        kafka_topic = %config.kafka.topic,
        http_addr = %config.http_addr(),
        "Configuration loaded"
    );

    let mut metrics = MetricsServer::new(config.metrics_addr());
    metrics.start().context("failed to start metrics exporter")?;
    info!(address = %config.metrics_addr(), "Metrics exporter started");

    info!("Connecting to rating store...");
    let repository = PostgresRatingRepository::connect(&config.pool_settings())
        .await
        .context("failed to connect to rating store")?;
    repository
        .migrate()
        .await
        .context("failed to run migrations")?;
    info!("Rating store connected and migrated");

    info!("Connecting to event bus...");
    let event_bus: Arc<dyn EventBus> = Arc::new(
        RedpandaEventBus::builder()
            .brokers(&config.kafka.brokers)
            .consumer_group(&config.kafka.group_id)
            .auto_offset_reset(&config.kafka.auto_offset_reset)
            .build()
            .context("failed to create event bus")?,
    );
    info!("Event bus ready");

    let service = Arc::new(RatingService::new(
        Arc::new(repository.clone()),
        Arc::new(SystemClock),
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let consumer = EventConsumer::new(
        "book-lifecycle",
        vec![config.kafka.topic.clone()],
        event_bus,
        Arc::new(LifecycleEventHandler::new(service.clone())),
        shutdown_rx,
    )
    .with_retry_delay(config.retry_backoff())
    .with_processing_timeout(config.processing_timeout())
    .spawn();

    let app = build_router(AppState::new(service), config.request_timeout());
    let addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    info!("HTTP server stopped, stopping consumer");

    let _ = shutdown_tx.send(());
    match tokio::time::timeout(config.shutdown_timeout(), consumer).await {
        Ok(Ok(())) => info!("Consumer stopped"),
        Ok(Err(e)) => error!(error = %e, "Consumer task failed"),
        Err(_) => warn!(
            timeout = ?config.shutdown_timeout(),
            "Consumer did not stop in time"
        ),
    }

    repository.close().await;
    info!("Rating store pool closed");

    served.context("HTTP server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
