use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub booking: BookingConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_json: bool,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub run_migrations: bool,
}

// Настройки Redis
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub show_cache_ttl_secs: u64,
}

/// Параметры ядра бронирования.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// Верхняя граница на одну попытку бронирования, включая ожидание блокировки сеанса
    pub tx_timeout_ms: u64,
    /// Сколько раз повторять фазу чтения при транзиентных сбоях
    pub read_retries: u32,
    pub retry_backoff_ms: u64,
    pub reconcile_interval_secs: u64,
}

impl BookingConfig {
    pub fn tx_timeout(&self) -> Duration {
        Duration::from_millis(self.tx_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Задержка перед повтором номер `attempt` (с 1): база удваивается,
    /// но не больше чем в 16 раз.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_backoff() * 2u32.pow(attempt.saturating_sub(1).min(4))
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            tx_timeout_ms: 2_000,
            read_retries: 3,
            retry_backoff_ms: 50,
            reconcile_interval_secs: 300,
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(name).unwrap_or_else(|_| default.to_string());
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parsed("PORT", "8000")?,
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "cinema_booking=debug,tower_http=debug".to_string()),
                log_json: env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: parsed("DB_POOL_SIZE", "20")?,
                run_migrations: parsed("RUN_MIGRATIONS", "true")?,
            },
            redis: RedisConfig {
                url: required("REDIS_URL")?,
                show_cache_ttl_secs: parsed("SHOW_CACHE_TTL_SECS", "30")?,
            },
            booking: BookingConfig {
                tx_timeout_ms: parsed("BOOKING_TX_TIMEOUT_MS", "2000")?,
                read_retries: parsed("BOOKING_READ_RETRIES", "3")?,
                retry_backoff_ms: parsed("BOOKING_RETRY_BACKOFF_MS", "50")?,
                reconcile_interval_secs: parsed("RECONCILE_INTERVAL_SECS", "300")?,
            },
        })
    }
}
