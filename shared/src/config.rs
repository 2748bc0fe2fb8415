use anyhow::Context;
use dotenv::dotenv;
use rust_decimal::Decimal;
use signal_engine::strategy::ParseFailurePolicy;
use std::str::FromStr;

/// Position sizing rules shared by every market type
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Share of the available balance committed to one entry
    pub balance_fraction: Decimal,
    /// Upper bound of one entry's notional, in USD
    pub max_notional_usd: Decimal,
    /// Multiplier applied to the exchange minimum notional
    pub min_notional_margin: Decimal,
    /// FAILED attempts tolerated on one candle before entries are refused
    pub max_failed_attempts_per_candle: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            balance_fraction: Decimal::new(10, 2),
            max_notional_usd: Decimal::new(1000, 0),
            min_notional_margin: Decimal::new(105, 2),
            max_failed_attempts_per_candle: 2,
        }
    }
}

pub struct Config {
    pub database_url: String,
    /// Enables the cross-process run lock when set
    pub redis_url: Option<String>,
    pub binance_spot_url: String,
    pub binance_futures_url: String,
    pub binance_coin_futures_url: String,
    pub exchange_timeout_secs: u64,
    pub exchange_recv_window_ms: u64,
    /// Candles fetched per (symbol, timeframe) group
    pub candle_limit: usize,
    pub run_interval_secs: u64,
    pub max_concurrent_groups: usize,
    pub parse_failure_policy: ParseFailurePolicy,
    pub api_bind_addr: String,
    /// Apply pending schema migrations when the scheduler starts
    pub run_migrations: bool,
    pub execution: ExecutionConfig,
}

fn env_or<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        let execution = ExecutionConfig {
            max_failed_attempts_per_candle: env_or("MAX_FAILED_ATTEMPTS_PER_CANDLE", 2)?,
            ..Default::default()
        };

        Ok(Config {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            binance_spot_url: std::env::var("BINANCE_SPOT_URL")
                .unwrap_or_else(|_| "https://api.binance.com".to_string()),
            binance_futures_url: std::env::var("BINANCE_FUTURES_URL")
                .unwrap_or_else(|_| "https://fapi.binance.com".to_string()),
            binance_coin_futures_url: std::env::var("BINANCE_COIN_FUTURES_URL")
                .unwrap_or_else(|_| "https://dapi.binance.com".to_string()),
            exchange_timeout_secs: env_or("EXCHANGE_TIMEOUT_SECS", 10)?,
            exchange_recv_window_ms: env_or("EXCHANGE_RECV_WINDOW_MS", 5000)?,
            candle_limit: env_or("CANDLE_LIMIT", 300)?,
            run_interval_secs: env_or("RUN_INTERVAL_SECS", 60)?,
            max_concurrent_groups: env_or("MAX_CONCURRENT_GROUPS", 4)?,
            parse_failure_policy: env_or("PARSE_FAILURE_POLICY", ParseFailurePolicy::UseDefault)?,
            api_bind_addr: std::env::var("API_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:9999".to_string()),
            run_migrations: env_or("RUN_MIGRATIONS", false)?,
            execution,
        })
    }
}
