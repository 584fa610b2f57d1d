use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub price_feed: PriceFeedConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    /// Seconds between guess placement and earliest allowed settlement
    #[serde(default = "default_reveal_window_secs")]
    pub reveal_window_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            reveal_window_secs: default_reveal_window_secs(),
        }
    }
}

fn default_reveal_window_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceFeedConfig {
    /// Binance REST endpoint
    #[serde(default = "default_price_feed_base_url")]
    pub base_url: String,
    /// Ticker symbol to quote
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_price_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_price_feed_base_url(),
            symbol: default_symbol(),
            timeout_ms: default_price_timeout_ms(),
        }
    }
}

fn default_price_feed_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_price_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Interval between worker polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum messages claimed per poll
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    /// Seconds a claimed message stays invisible before redelivery
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_batch_size() -> i64 {
    10
}

fn default_visibility_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Listen address for the HTTP API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("database.url", "postgres://localhost/bitguess")?
            .set_default("database.max_connections", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("BITGUESS_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (BITGUESS_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("BITGUESS")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.game.reveal_window_secs == 0 {
            errors.push("game.reveal_window_secs must be positive".to_string());
        }

        if self.queue.batch_size <= 0 {
            errors.push("queue.batch_size must be positive".to_string());
        }

        if self.queue.poll_interval_ms == 0 {
            errors.push("queue.poll_interval_ms must be positive".to_string());
        }

        if self.queue.visibility_timeout_secs == 0 {
            errors.push("queue.visibility_timeout_secs must be positive".to_string());
        }

        if self.database.url.is_empty() {
            errors.push("database.url must be set".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig {
            database: DatabaseConfig {
                url: "postgres://localhost/bitguess".to_string(),
                max_connections: 5,
            },
            game: GameConfig::default(),
            price_feed: PriceFeedConfig::default(),
            queue: QueueConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        };

        assert!(config.validate().is_ok());
        assert_eq!(config.game.reveal_window_secs, 60);
        assert_eq!(config.price_feed.symbol, "BTCUSDT");
    }

    #[test]
    fn zero_reveal_window_is_rejected() {
        let config = AppConfig {
            database: DatabaseConfig {
                url: "postgres://localhost/bitguess".to_string(),
                max_connections: 5,
            },
            game: GameConfig {
                reveal_window_secs: 0,
            },
            price_feed: PriceFeedConfig::default(),
            queue: QueueConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        };

        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("reveal_window_secs")));
    }
}
