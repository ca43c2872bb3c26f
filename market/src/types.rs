use std::fmt;

use serde::{Deserialize, Serialize};

use common::time::{HOUR_MS, MINUTE_MS};

/// Market venue an instrument can be listed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    Spot,
    /// Perpetuals margined in the quote currency.
    LinearFutures,
    /// Perpetuals margined in the base asset.
    InverseFutures,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Spot => "spot",
            Venue::LinearFutures => "linear_futures",
            Venue::InverseFutures => "inverse_futures",
        }
    }

    pub fn is_futures(&self) -> bool {
        !matches!(self, Venue::Spot)
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candle / statistics bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
}

impl CandleInterval {
    /// Wire label used by the venue APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::Min15 => "15m",
            CandleInterval::Hour1 => "1h",
            CandleInterval::Hour4 => "4h",
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            CandleInterval::Min15 => 15 * MINUTE_MS,
            CandleInterval::Hour1 => HOUR_MS,
            CandleInterval::Hour4 => 4 * HOUR_MS,
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized OHLC candle. Only the fields the engine reads are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time_ms: u64,
    pub close_time_ms: u64,
    pub close: f64,
    /// Base-asset units.
    pub volume: f64,
    /// Base-asset units.
    pub taker_buy_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingPoint {
    pub funding_time_ms: u64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenInterestPoint {
    pub ts_ms: u64,
    /// Base-asset units.
    pub open_interest: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Forced liquidation order. `Sell` liquidates a long, `Buy` liquidates a short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Liquidation {
    pub ts_ms: u64,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
}

/// Spot aggregates over the trailing 24 hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotAggregates {
    pub last_price: Option<f64>,
    pub volume_24h: Option<f64>,
    pub taker_buy_volume_24h: Option<f64>,
}

/// Current funding state of a perpetual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingInfo {
    pub rate: Option<f64>,
    pub next_funding_time_ms: Option<u64>,
    pub mark_price: Option<f64>,
}
