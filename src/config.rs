use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::criteria::{MissingDataPolicy, RuleSet};
use crate::services::rate_limiter::RetryPolicy;
use crate::services::scanner::ScanSettings;
use crate::sources::finnhub::DEFAULT_BASE_URL;
use crate::types::Timeframe;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Finnhub API key. Scanning is disabled without it.
    pub finnhub_api_key: Option<String>,
    pub finnhub_base_url: String,
    /// SQLite database file for scan results.
    pub database_path: String,
    /// Fixed universe; empty means the provider's US listing.
    pub universe_symbols: Vec<String>,
    /// Cap on listed symbols scanned per cycle.
    pub universe_limit: usize,
    /// Seconds between scheduled scans (0 disables the scheduler).
    pub scan_interval_secs: u64,
    /// Seconds between retention prunes.
    pub prune_interval_secs: u64,
    pub scan: ScanSettings,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup. Unparseable values use defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());
        let defaults = ScanSettings::default();
        let default_rules = &defaults.rules;

        let policy = |key: &str| {
            lookup(key)
                .and_then(|v| MissingDataPolicy::from_str(&v))
                .unwrap_or_default()
        };

        let timeframes = lookup("TIMEFRAMES")
            .map(|s| s.split(',').filter_map(Timeframe::from_str).collect())
            .unwrap_or_else(|| Timeframe::DEFAULT_GRID.to_vec());

        let universe_symbols = lookup("UNIVERSE_SYMBOLS")
            .map(|s| {
                s.split(',')
                    .map(|sym| sym.trim().to_uppercase())
                    .filter(|sym| !sym.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let rules = RuleSet {
            min_price: parse("MIN_PRICE").unwrap_or(default_rules.min_price),
            max_price: parse("MAX_PRICE").unwrap_or(default_rules.max_price),
            min_gain_percent: parse("MIN_GAIN_PERCENT").unwrap_or(default_rules.min_gain_percent),
            spike_multiplier: parse("VOLUME_SPIKE_MULTIPLIER")
                .unwrap_or(default_rules.spike_multiplier),
            max_float: parse("MAX_FLOAT").unwrap_or(default_rules.max_float),
            catalyst_lookback_hours: parsed(&lookup, "CATALYST_LOOKBACK_HOURS")
                .unwrap_or(default_rules.catalyst_lookback_hours),
            float_policy: policy("FLOAT_POLICY"),
            catalyst_policy: policy("CATALYST_POLICY"),
        };

        let retry = RetryPolicy {
            max_retries: parsed(&lookup, "MAX_RETRIES").unwrap_or(defaults.retry.max_retries),
            base_delay: parsed(&lookup, "RETRY_BASE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.base_delay),
            ..defaults.retry
        };

        let scan = ScanSettings {
            rules,
            timeframes,
            concurrency: parsed(&lookup, "SCAN_CONCURRENCY").unwrap_or(defaults.concurrency),
            requests_per_minute: parsed(&lookup, "REQUESTS_PER_MINUTE")
                .unwrap_or(defaults.requests_per_minute),
            retry,
            scan_timeout: parsed(&lookup, "SCAN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.scan_timeout),
            top_n: parsed(&lookup, "TOP_N").unwrap_or(defaults.top_n),
            retention: parsed::<i64, _>(&lookup, "RETENTION_HOURS")
                .filter(|hours| *hours > 0)
                .and_then(chrono::Duration::try_hours)
                .unwrap_or(defaults.retention),
            model_b_margin: parse("MODEL_B_MARGIN").unwrap_or(defaults.model_b_margin),
            volume_lookback_days: parsed(&lookup, "VOLUME_LOOKBACK_DAYS")
                .unwrap_or(defaults.volume_lookback_days),
            float_ratio: parse("FLOAT_RATIO").unwrap_or(defaults.float_ratio),
        };

        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&lookup, "PORT").unwrap_or(3001),
            finnhub_api_key: lookup("FINNHUB_API_KEY").filter(|k| !k.trim().is_empty()),
            finnhub_base_url: lookup("FINNHUB_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| "momoscan.db".to_string()),
            universe_symbols,
            universe_limit: parsed(&lookup, "UNIVERSE_LIMIT").unwrap_or(200),
            scan_interval_secs: parsed(&lookup, "SCAN_INTERVAL_SECS").unwrap_or(300),
            prune_interval_secs: parsed(&lookup, "PRUNE_INTERVAL_SECS").unwrap_or(3600),
            scan,
        }
    }
}

fn parsed<T: FromStr, F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
