use anyhow::Result;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub database: DatabaseConfig,
    pub marketplace: MarketplaceConfig,
    pub verification: VerificationConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub gateway_url: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub sqlite_path: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceConfig {
    pub default_listing_days: i64,
    pub sweep_interval_secs: u64,
    pub retention_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    pub cache_ttl_secs: u64,
    pub verify_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub http_port: u16,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            ledger: LedgerConfig {
                gateway_url: env::var("LEDGER_GATEWAY_URL")
                    .unwrap_or_else(|_| "http://localhost:8545".to_string()),
                request_timeout_secs: env::var("LEDGER_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                max_retries: env::var("LEDGER_MAX_RETRIES")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                retry_backoff_ms: env::var("LEDGER_RETRY_BACKOFF_MS")
                    .unwrap_or_else(|_| "250".to_string())
                    .parse()
                    .unwrap_or(250),
            },
            database: DatabaseConfig {
                sqlite_path: env::var("SQLITE_PATH")
                    .unwrap_or_else(|_| "data/marketplace.db".to_string()),
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            marketplace: MarketplaceConfig {
                default_listing_days: env::var("DEFAULT_LISTING_DAYS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
                sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
                // 0 disables retention cleanup of terminal listings
                retention_days: env::var("RETENTION_DAYS")
                    .unwrap_or_else(|_| "0".to_string())
                    .parse()
                    .unwrap_or(0),
            },
            verification: VerificationConfig {
                cache_ttl_secs: env::var("VERIFICATION_CACHE_TTL_SECS")
                    .unwrap_or_else(|_| "1800".to_string())
                    .parse()
                    .unwrap_or(1800),
                verify_concurrency: env::var("VERIFY_CONCURRENCY")
                    .unwrap_or_else(|_| "8".to_string())
                    .parse()
                    .unwrap_or(8),
            },
            monitoring: MonitoringConfig {
                http_port: env::var("HTTP_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
        })
    }
}
