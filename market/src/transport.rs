//! Market-data transport contract.
//!
//! One implementation covers all three venues. Payloads are returned close to
//! the wire format (numbers as strings); the fetchers own numeric coercion.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::types::{CandleInterval, Venue};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("upstream returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("{capability} is not offered on {venue}")]
    Unsupported {
        venue: Venue,
        capability: &'static str,
    },
}

impl TransportError {
    /// Upstream HTTP status, when the failure carried one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Kline as decoded from the positional array format.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandle {
    pub open_time: u64,
    pub close: String,
    pub volume: String,
    pub close_time: u64,
    pub taker_buy_base_volume: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawPrice {
    pub price: String,
}

/// 24h rolling spot ticker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTicker {
    pub last_price: String,
    pub volume: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPremiumIndex {
    pub mark_price: String,
    pub last_funding_rate: String,
    #[serde(default)]
    pub next_funding_time: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFundingRate {
    pub funding_time: u64,
    pub funding_rate: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOpenInterest {
    pub open_interest: String,
    #[serde(default)]
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOpenInterestHist {
    pub timestamp: u64,
    /// Linear: base units. Inverse: contracts.
    pub sum_open_interest: String,
    /// Linear: quote notional. Inverse: base units.
    pub sum_open_interest_value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLiquidation {
    pub time: u64,
    pub side: String,
    pub average_price: String,
    pub executed_qty: String,
}

/// One entry of the inverse perpetual catalog.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InverseContract {
    pub symbol: String,
    pub base_asset: String,
    pub contract_type: String,
    /// Quote value of one contract.
    pub contract_size: f64,
}

impl InverseContract {
    pub fn is_perpetual(&self) -> bool {
        self.contract_type.eq_ignore_ascii_case("PERPETUAL")
    }
}

/// Each call is one external request. Implementations apply their own
/// timeout and never retry.
#[async_trait]
pub trait MarketDataTransport: Send + Sync {
    /// Succeeds iff the venue knows the instrument.
    async fn probe_instrument(&self, venue: Venue, symbol: &str) -> Result<(), TransportError>;

    /// Full inverse contract catalog (all contract types).
    async fn inverse_catalog(&self) -> Result<Vec<InverseContract>, TransportError>;

    async fn last_price(&self, venue: Venue, symbol: &str) -> Result<RawPrice, TransportError>;

    async fn candles(
        &self,
        venue: Venue,
        symbol: &str,
        interval: CandleInterval,
        limit: usize,
    ) -> Result<Vec<RawCandle>, TransportError>;

    async fn spot_ticker(&self, symbol: &str) -> Result<RawTicker, TransportError>;

    async fn premium_index(
        &self,
        venue: Venue,
        symbol: &str,
    ) -> Result<RawPremiumIndex, TransportError>;

    async fn funding_history(
        &self,
        venue: Venue,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<RawFundingRate>, TransportError>;

    async fn open_interest(
        &self,
        venue: Venue,
        symbol: &str,
    ) -> Result<RawOpenInterest, TransportError>;

    async fn open_interest_history(
        &self,
        venue: Venue,
        symbol: &str,
        period: CandleInterval,
        limit: usize,
    ) -> Result<Vec<RawOpenInterestHist>, TransportError>;

    async fn liquidations(
        &self,
        venue: Venue,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<RawLiquidation>, TransportError>;
}
