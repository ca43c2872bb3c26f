use std::time::Duration;

use market::SignalThresholds;
use market::orchestrator::normalize_symbol;
use thiserror::Error;

pub const DEFAULT_SPOT_BASE_URL: &str = "https://api.binance.com";
pub const DEFAULT_LINEAR_BASE_URL: &str = "https://fapi.binance.com";
pub const DEFAULT_INVERSE_BASE_URL: &str = "https://dapi.binance.com";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("SYMBOLS must list at least one instrument")]
    MissingSymbols,

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Tracked instruments, uppercased, in configured order.
    pub symbols: Vec<String>,

    /// Gap between poll passes. The first pass runs at startup.
    pub poll_interval: Duration,

    /// Reserved for the HTTP routing layer, which lives outside this binary.
    pub port: u16,

    /// Per-request upstream timeout. Requests are never retried.
    pub http_timeout: Duration,

    pub spot_base_url: String,
    pub linear_base_url: String,
    pub inverse_base_url: String,

    /// How far back the history store keeps snapshots.
    pub history_window: Duration,

    // =========================
    // Signal thresholds
    // =========================
    /// Absolute 15m price move (percent) that scores.
    pub price_move_pct: f64,

    /// Absolute 4h open-interest move (percent) that scores.
    pub open_interest_move_pct: f64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Unset and blank keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let symbols = get("SYMBOLS")
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                normalize_symbol(s).map_err(|_| ConfigError::Invalid {
                    key: "SYMBOLS",
                    value: s.trim().to_string(),
                })
            })
            .collect::<Result<Vec<String>, ConfigError>>()?;
        if symbols.is_empty() {
            return Err(ConfigError::MissingSymbols);
        }

        let poll_secs: u64 = parse_or(&get, "POLL_INTERVAL_SECS", 60)?;
        let window_hours: u64 = parse_or(&get, "HISTORY_WINDOW_HOURS", 24)?;
        let timeout_ms: u64 = parse_or(&get, "HTTP_TIMEOUT_MS", 5_000)?;

        // Zero would spin the poller or empty the history on every append.
        for (key, value) in [
            ("POLL_INTERVAL_SECS", poll_secs),
            ("HISTORY_WINDOW_HOURS", window_hours),
            ("HTTP_TIMEOUT_MS", timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    value: value.to_string(),
                });
            }
        }

        let history_window = window_hours
            .checked_mul(3_600)
            .map(Duration::from_secs)
            .ok_or(ConfigError::Invalid {
                key: "HISTORY_WINDOW_HOURS",
                value: window_hours.to_string(),
            })?;

        let defaults = SignalThresholds::default();

        Ok(Self {
            symbols,
            poll_interval: Duration::from_secs(poll_secs),
            port: parse_or(&get, "PORT", 8080)?,
            http_timeout: Duration::from_millis(timeout_ms),
            spot_base_url: url_or(&get, "SPOT_BASE_URL", DEFAULT_SPOT_BASE_URL),
            linear_base_url: url_or(&get, "LINEAR_BASE_URL", DEFAULT_LINEAR_BASE_URL),
            inverse_base_url: url_or(&get, "INVERSE_BASE_URL", DEFAULT_INVERSE_BASE_URL),
            history_window,
            price_move_pct: positive_or(&get, "PRICE_MOVE_PCT", defaults.price_move_pct)?,
            open_interest_move_pct: positive_or(
                &get,
                "OI_MOVE_PCT",
                defaults.open_interest_move_pct,
            )?,
        })
    }

    pub fn thresholds(&self) -> SignalThresholds {
        SignalThresholds {
            price_move_pct: self.price_move_pct,
            open_interest_move_pct: self.open_interest_move_pct,
            ..SignalThresholds::default()
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn positive_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: f64,
) -> Result<f64, ConfigError> {
    let value: f64 = parse_or(get, key, default)?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
    }
}

fn url_or(get: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get(key)
        .map(|u| u.trim().trim_end_matches('/').to_string())
        .unwrap_or_else(|| default.to_string())
}
