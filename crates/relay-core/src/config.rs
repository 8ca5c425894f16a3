//! Environment-driven configuration (spec §6).

use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

use crate::{Error, Result};

/// Top-level application configuration, assembled from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub detector: DetectorConfig,
    pub ingestor: IngestorConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub rest_base_url: String,
    pub stream_url: String,
    pub http_timeout_secs: u64,
    pub exchange_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    pub interval_secs: u64,
    pub min_volume: Decimal,
    pub min_trades: u64,
    pub min_win_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestorConfig {
    pub poll_interval_secs: u64,
    pub poll_batch: usize,
    pub dedup_lru_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
    pub backoff_cap_secs: u64,
    pub visibility_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub concurrency: usize,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// defaults documented in spec §6.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    Error::Internal("DATABASE_URL environment variable not set".to_string())
                })?,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 20),
            },
            upstream: UpstreamConfig {
                rest_base_url: env::var("UPSTREAM_REST_BASE_URL")
                    .unwrap_or_else(|_| "https://clob.polymarket.com".to_string()),
                stream_url: env::var("UPSTREAM_STREAM_URL").unwrap_or_else(|_| {
                    "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string()
                }),
                http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", 10),
                exchange_timeout_secs: env_or("EXCHANGE_SUBMIT_TIMEOUT_SECS", 30),
            },
            detector: DetectorConfig {
                interval_secs: env_or("DETECTOR_INTERVAL_SECS", 300),
                min_volume: env::var("DETECTOR_MIN_VOLUME")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(Decimal::new(1000, 0)),
                min_trades: env_or("DETECTOR_MIN_TRADES", 10),
                min_win_rate: env_or("DETECTOR_MIN_WIN_RATE", 0.52),
            },
            ingestor: IngestorConfig {
                poll_interval_secs: env_or("INGESTOR_POLL_INTERVAL_SECS", 5),
                poll_batch: env_or("INGESTOR_POLL_BATCH", 10),
                dedup_lru_size: env_or("INGESTOR_DEDUP_LRU_SIZE", 10_000),
            },
            queue: QueueConfig {
                max_attempts: env_or("QUEUE_MAX_ATTEMPTS", 5),
                backoff_base_secs: env_or("QUEUE_BACKOFF_BASE_SECS", 1),
                backoff_cap_secs: env_or("QUEUE_BACKOFF_CAP_SECS", 300),
                visibility_timeout_secs: env_or("QUEUE_VISIBILITY_TIMEOUT_SECS", 60),
            },
            worker: WorkerConfig {
                concurrency: env_or("WORKER_CONCURRENCY", 10),
            },
        })
    }

    /// Configuration for tests, with no dependency on the environment.
    pub fn test_config() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/relay_test".to_string(),
                max_connections: 2,
            },
            upstream: UpstreamConfig {
                rest_base_url: "https://clob.polymarket.com".to_string(),
                stream_url: "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string(),
                http_timeout_secs: 10,
                exchange_timeout_secs: 30,
            },
            detector: DetectorConfig {
                interval_secs: 300,
                min_volume: Decimal::new(1000, 0),
                min_trades: 10,
                min_win_rate: 0.52,
            },
            ingestor: IngestorConfig {
                poll_interval_secs: 5,
                poll_batch: 10,
                dedup_lru_size: 10_000,
            },
            queue: QueueConfig {
                max_attempts: 5,
                backoff_base_secs: 1,
                backoff_cap_secs: 300,
                visibility_timeout_secs: 60,
            },
            worker: WorkerConfig { concurrency: 10 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_has_sane_defaults() {
        let config = Config::test_config();
        assert_eq!(config.worker.concurrency, 10);
        assert_eq!(config.queue.max_attempts, 5);
        assert_eq!(config.detector.min_trades, 10);
    }
}
