//! Environment-sourced configuration snapshot.
//!
//! Read once at startup into [`Config`]; the few fields that change at
//! runtime (`copy_enabled`, the replay cursor) live in the store's
//! `config_kv` table instead, so toggling them doesn't require a restart.

use copytrade_model::Product;
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Startup configuration for the replication engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string for [`copytrade_store::PostgresStore`].
    pub database_url: String,

    /// Base URL of the broker's REST API.
    pub broker_base_url: String,

    /// Default sizing strategy applied when a leader order carries no
    /// per-symbol override.
    pub default_sizing_strategy: String,

    /// Fixed ratio used when `default_sizing_strategy == "fixed_ratio"`.
    pub fixed_ratio: String,
    /// Percentage of follower balance a single `risk_based` placement
    /// may commit to notional exposure.
    pub max_position_pct: String,

    /// Max orders per account per rate-limit window.
    pub rate_limit_max_orders: u32,
    /// Width of the rate-limit sliding window.
    pub rate_limit_window: Duration,

    /// How long a missing heartbeat is tolerated before the Stream
    /// Consumer treats the connection as dead.
    pub heartbeat_timeout: Duration,
    /// How often the Stream Consumer expects a heartbeat message.
    pub heartbeat_ping_interval: Duration,
    /// How far back Recovery looks on a cold start (no persisted cursor).
    pub cold_start_lookback: Duration,
    /// Initial reconnect backoff.
    pub reconnect_backoff_min: Duration,
    /// Reconnect backoff ceiling.
    pub reconnect_backoff_max: Duration,
    /// Consecutive failed reconnect attempts tolerated before the Stream
    /// Consumer gives up on the leader stream and escalates a fatal error
    /// to the Supervisor.
    pub max_reconnect_attempts: u32,

    /// Upper bound the Supervisor waits for in-flight work to finish
    /// before forcing a shutdown.
    pub drain_timeout: Duration,

    /// `true` to emit JSON logs instead of human-readable ones.
    pub json_logs: bool,

    /// Product families eligible for copy trading (spec §4.6.1
    /// precondition 3). Empty means "permit every broker-supported
    /// value", the precondition's own stated default.
    pub copy_eligible_products: Vec<Product>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            broker_base_url: required("BROKER_BASE_URL")?,
            default_sizing_strategy: optional("DEFAULT_SIZING_STRATEGY", "capital_proportional"),
            fixed_ratio: optional("FIXED_RATIO", "1"),
            max_position_pct: optional("MAX_POSITION_PCT", "2"),
            rate_limit_max_orders: parse_optional("RATE_LIMIT_MAX_ORDERS", 10)?,
            rate_limit_window: Duration::from_secs(parse_optional("RATE_LIMIT_WINDOW_SECS", 1)?),
            heartbeat_timeout: Duration::from_secs(parse_optional("HEARTBEAT_TIMEOUT_SECS", 60)?),
            heartbeat_ping_interval: Duration::from_secs(parse_optional(
                "HEARTBEAT_PING_INTERVAL_SECS",
                30,
            )?),
            cold_start_lookback: Duration::from_secs(parse_optional(
                "COLD_START_LOOKBACK_SECS",
                3600,
            )?),
            reconnect_backoff_min: Duration::from_secs(parse_optional(
                "RECONNECT_BACKOFF_MIN_SECS",
                1,
            )?),
            reconnect_backoff_max: Duration::from_secs(parse_optional(
                "RECONNECT_BACKOFF_MAX_SECS",
                60,
            )?),
            max_reconnect_attempts: parse_optional("MAX_RECONNECT_ATTEMPTS", 10)?,
            drain_timeout: Duration::from_secs(parse_optional("DRAIN_TIMEOUT_SECS", 30)?),
            json_logs: optional("LOG_FORMAT", "text") == "json",
            copy_eligible_products: parse_product_allow_list("COPY_ELIGIBLE_PRODUCTS")?,
        })
    }
}

/// Parses a comma-separated list of product names (e.g.
/// `"intraday,bo"`) into the corresponding [`Product`] values. An
/// unset or empty variable yields an empty list, meaning "permit
/// every broker-supported value".
fn parse_product_allow_list(key: &'static str) -> Result<Vec<Product>, ConfigError> {
    let raw = match env::var(key) {
        Err(_) => return Ok(Vec::new()),
        Ok(value) => value,
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_product(key, s))
        .collect()
}

fn parse_product(key: &'static str, value: &str) -> Result<Product, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "cnc" => Ok(Product::Cnc),
        "intraday" => Ok(Product::Intraday),
        "margin" => Ok(Product::Margin),
        "mtf" => Ok(Product::Mtf),
        "co" => Ok(Product::Co),
        "bo" => Ok(Product::Bo),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn optional(key: &'static str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_optional<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}
