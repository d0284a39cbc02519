//! Application configuration loaded from environment variables.

use saga::{ConsumerConfig, CoordinatorConfig};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset means in-memory adapters
/// - `CONSUMER_GROUP`: consumer group of the SAGA listener (default: `"payment-service"`)
/// - `LOG_PARTITIONS`: partitions per topic of the in-process log (default: `3`)
///
/// Lock and idempotency tuning is read by [`CoordinatorConfig::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub consumer_group: String,
    pub log_partitions: u32,
    pub coordinator: CoordinatorConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            consumer_group: std::env::var("CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            log_partitions: std::env::var("LOG_PARTITIONS")
                .ok()
                .and_then(|p| p.parse().ok())
                .filter(|p| *p > 0)
                .unwrap_or(defaults.log_partitions),
            coordinator: CoordinatorConfig::from_env(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Consumer settings for the configured group.
    pub fn consumer(&self) -> ConsumerConfig {
        ConsumerConfig::default().with_group(self.consumer_group.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            consumer_group: "payment-service".to_string(),
            log_partitions: 3,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.log_partitions, 3);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_consumer_uses_configured_group() {
        let config = Config {
            consumer_group: "payment-service-blue".to_string(),
            ..Config::default()
        };
        let consumer = config.consumer();
        assert_eq!(consumer.group, "payment-service-blue");
        assert_eq!(consumer.batch_size, 10);
    }
}
