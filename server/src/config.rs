//! Configuration management for the ratings server.
//!
//! Loads configuration from environment variables with sensible defaults.
//! A `.env` file in the working directory is honoured when present.

use ratings_postgres::PoolSettings;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` configuration
    pub postgres: PostgresConfig,
    /// Kafka/Redpanda configuration
    pub kafka: KafkaConfig,
    /// Consumer loop tuning
    pub consumer: ConsumerConfig,
    /// HTTP server configuration
    pub server: ServerConfig,
}

/// `PostgreSQL` configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// `PostgreSQL` connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// Statement timeout in seconds
    pub statement_timeout: u64,
}

/// Kafka/Redpanda configuration
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Broker addresses (comma-separated)
    pub brokers: String,
    /// Topic carrying book lifecycle events
    pub topic: String,
    /// Consumer group
    pub group_id: String,
    /// Where a new group starts reading: earliest or latest
    pub auto_offset_reset: String,
}

/// Consumer loop tuning
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Pause after transport errors, in milliseconds
    pub retry_backoff_ms: u64,
    /// Upper bound on handling one message, in seconds
    pub processing_timeout_secs: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Prometheus exporter port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn string(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        // A missing .env file is the normal case in containers.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| {
            format!(
                "postgres://{}:{}@{}:{}/{}?sslmode={}",
                string(&lookup, "DB_USER", "postgres"),
                string(&lookup, "DB_PASSWORD", "123"),
                string(&lookup, "DB_HOST", "db"),
                string(&lookup, "DB_PORT", "5432"),
                string(&lookup, "DB_NAME", "Ratings"),
                string(&lookup, "DB_SSLMODE", "disable"),
            )
        });

        Self {
            postgres: PostgresConfig {
                url: database_url,
                max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10),
                connect_timeout: parsed(&lookup, "DATABASE_CONNECT_TIMEOUT", 30),
                statement_timeout: parsed(&lookup, "DATABASE_STATEMENT_TIMEOUT", 30),
            },
            kafka: KafkaConfig {
                brokers: string(&lookup, "KAFKA_BROKERS", "kafka:9092"),
                topic: string(&lookup, "KAFKA_TOPIC", "library-events"),
                group_id: string(&lookup, "KAFKA_GROUP_ID", "rating-service"),
                auto_offset_reset: string(&lookup, "KAFKA_AUTO_OFFSET_RESET", "earliest"),
            },
            consumer: ConsumerConfig {
                retry_backoff_ms: parsed(&lookup, "CONSUMER_RETRY_BACKOFF_MS", 1000),
                processing_timeout_secs: parsed(&lookup, "CONSUMER_PROCESSING_TIMEOUT_SECS", 10),
            },
            server: ServerConfig {
                host: string(&lookup, "HOST", "0.0.0.0"),
                port: parsed(&lookup, "PORT", 8081),
                request_timeout_secs: parsed(&lookup, "REQUEST_TIMEOUT_SECS", 10),
                metrics_port: parsed(&lookup, "METRICS_PORT", 9090),
                shutdown_timeout: parsed(&lookup, "SHUTDOWN_TIMEOUT", 5),
            },
        }
    }

    /// Pool settings for the rating store.
    #[must_use]
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            url: self.postgres.url.clone(),
            max_connections: self.postgres.max_connections,
            connect_timeout: Duration::from_secs(self.postgres.connect_timeout),
            statement_timeout: Duration::from_secs(self.postgres.statement_timeout),
        }
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Address the Prometheus exporter binds to.
    #[must_use]
    pub fn metrics_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.server.metrics_port))
    }

    /// Back-off after transport errors and lost subscriptions.
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.consumer.retry_backoff_ms)
    }

    /// Upper bound on handling one lifecycle message.
    #[must_use]
    pub const fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.consumer.processing_timeout_secs)
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// How long shutdown waits for the consumer to drain.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout)
    }
}
