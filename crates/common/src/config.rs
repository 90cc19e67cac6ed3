use serde::Deserialize;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// Full connection URL; takes precedence over the individual fields
    pub url: Option<String>,
}

impl DatabaseConfig {
    /// Build database URL from configuration
    pub fn url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.username, self.password, self.host, self.port, self.database
            ),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "orders".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 5,
            url: None,
        }
    }
}

/// Kafka configuration
///
/// `group_id` is the durable subscription name: committed offsets are kept
/// per group, so redelivery of unacknowledged orders survives restarts.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: "orders".to_string(),
            group_id: "order-service".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Order cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Store fetches in flight while restoring the cache at startup
    pub restore_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            restore_concurrency: 16,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from the environment (and `.env`, if present)
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            log_level: "info".to_string(),
            ..Default::default()
        };

        if let Some(url) = lookup("DATABASE_URL") {
            config.database.url = Some(url);
        }
        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            config.database.max_connections = max;
        }
        if let Some(brokers) = lookup("KAFKA_BROKERS") {
            config.kafka.brokers = brokers;
        }
        if let Some(topic) = lookup("KAFKA_TOPIC") {
            config.kafka.topic = topic;
        }
        if let Some(group_id) = lookup("CONSUMER_GROUP") {
            config.kafka.group_id = group_id;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.parse().ok()) {
            config.http.port = port;
        }
        if let Some(n) = lookup("CACHE_RESTORE_CONCURRENCY")
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
        {
            config.cache.restore_concurrency = n;
        }
        if let Some(level) = lookup("RUST_LOG") {
            config.log_level = level;
        }

        config
    }
}
