//! Metric Fetchers.
//!
//! Every fetcher issues exactly one request (or one joined group for a
//! composite) and degrades to `None` / an empty vec on failure. Errors are
//! logged here and never reach the orchestrator.

pub mod perpetual;
pub mod price;
pub mod spot;

use tracing::warn;

use crate::transport::{MarketDataTransport, TransportError};
use crate::types::{
    Candle, CandleInterval, FundingInfo, FundingPoint, Liquidation, OpenInterestPoint,
    SpotAggregates, Venue,
};
use crate::venues::VenueMembership;

/// Funding points requested and retained per snapshot.
pub const FUNDING_HISTORY_LEN: usize = 6;
/// Open-interest buckets requested and retained per snapshot.
pub const OPEN_INTEREST_HISTORY_LEN: usize = 6;
/// Liquidations retained per snapshot.
pub const LIQUIDATION_TAIL_LEN: usize = 10;
/// Liquidations requested per fetch.
pub const LIQUIDATION_FETCH_LIMIT: usize = 50;
/// 15m candles requested (two hours).
pub const CANDLES_15M_LIMIT: usize = 8;
/// 4h candles requested (one day).
pub const CANDLES_4H_LIMIT: usize = 6;

/// Everything fetched for one instrument in one cycle. Each field is
/// independently empty when its fetcher failed or its venue is not listed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetrics {
    pub spot: Option<SpotAggregates>,
    pub candles_15m: Vec<Candle>,
    pub candles_4h: Vec<Candle>,
    pub last_price: Option<f64>,
    pub funding: Option<FundingInfo>,
    pub funding_history: Vec<FundingPoint>,
    pub open_interest: Option<f64>,
    pub open_interest_history: Vec<OpenInterestPoint>,
    pub liquidations: Vec<Liquidation>,
}

/// Fan out every applicable fetcher for `symbol` and await them jointly.
///
/// Spot fetchers run only when spot-listed. Futures fetchers target the
/// linear perpetual, or the inverse contract when linear is not listed.
pub async fn collect(
    transport: &dyn MarketDataTransport,
    symbol: &str,
    membership: &VenueMembership,
    inverse_contract_size: Option<f64>,
) -> RawMetrics {
    let spot_fut = async {
        if membership.spot {
            spot::fetch_spot_aggregates(transport, symbol).await
        } else {
            None
        }
    };

    let futures_fut = async {
        match membership.futures_venue(symbol) {
            Some((venue, venue_symbol)) => {
                perpetual::fetch_perpetual_metrics(
                    transport,
                    venue,
                    venue_symbol,
                    inverse_contract_size,
                )
                .await
            }
            None => perpetual::PerpetualMetrics::default(),
        }
    };

    let price_fut = async {
        match membership.price_venue(symbol) {
            Some((venue, venue_symbol)) => {
                price::fetch_price_series(transport, venue, venue_symbol).await
            }
            None => price::PriceSeries::default(),
        }
    };

    let (spot, fut, series) = tokio::join!(spot_fut, futures_fut, price_fut);

    RawMetrics {
        spot,
        candles_15m: series.candles_15m,
        candles_4h: series.candles_4h,
        last_price: series.last_price,
        funding: fut.funding,
        funding_history: fut.funding_history,
        open_interest: fut.open_interest,
        open_interest_history: fut.open_interest_history,
        liquidations: fut.liquidations,
    }
}

/// Parse an upstream decimal string. Empty, malformed or non-finite -> `None`.
pub fn parse_num(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Like `parse_num` but missing values count as zero.
pub fn parse_num_or_zero(raw: &str) -> f64 {
    parse_num(raw).unwrap_or(0.0)
}

/// Keep the last `n` elements.
pub fn tail<T>(mut items: Vec<T>, n: usize) -> Vec<T> {
    if items.len() > n {
        items.drain(..items.len() - n);
    }
    items
}

/// Collapse a fetch result into its value, logging the failure.
pub(crate) fn degrade<T>(
    result: Result<T, TransportError>,
    metric: &'static str,
    venue: Venue,
    symbol: &str,
) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(
                metric,
                %venue,
                symbol,
                status = e.status_code(),
                error = %e,
                "fetch failed; metric left empty for this cycle"
            );
            None
        }
    }
}

pub(crate) fn interval_label(interval: CandleInterval) -> &'static str {
    match interval {
        CandleInterval::Min15 => "candles_15m",
        CandleInterval::Hour1 => "candles_1h",
        CandleInterval::Hour4 => "candles_4h",
    }
}
