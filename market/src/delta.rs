//! Delta Calculator.
//!
//! Aligns candle, funding and open-interest series into the derived-metrics
//! bundle and the percentage deltas the signal engine consumes.

use serde::{Deserialize, Serialize};

use crate::fetchers::RawMetrics;
use crate::types::{Candle, CandleInterval};

/// Endpoints of every comparison, before any percentage is taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub price_now: Option<f64>,
    pub price_15m_ago: Option<f64>,
    pub price_4h_ago: Option<f64>,
    pub funding_now: Option<f64>,
    pub funding_prev: Option<f64>,
    pub open_interest_now: Option<f64>,
    pub open_interest_4h_ago: Option<f64>,
    /// Taker buy minus taker sell, base units.
    pub net_flow: Option<f64>,
}

/// Input of the signal engine. Percentages are `None` when either endpoint
/// is unknown or the base is zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deltas {
    pub price_change_15m_pct: Option<f64>,
    pub price_change_4h_pct: Option<f64>,
    pub open_interest_change_4h_pct: Option<f64>,
    pub funding_rate_now: Option<f64>,
    pub funding_rate_prev: Option<f64>,
    pub net_flow: Option<f64>,
}

impl DerivedMetrics {
    pub fn deltas(&self) -> Deltas {
        Deltas {
            price_change_15m_pct: percent_change(self.price_15m_ago, self.price_now),
            price_change_4h_pct: percent_change(self.price_4h_ago, self.price_now),
            open_interest_change_4h_pct: percent_change(
                self.open_interest_4h_ago,
                self.open_interest_now,
            ),
            funding_rate_now: self.funding_now,
            funding_rate_prev: self.funding_prev,
            net_flow: self.net_flow,
        }
    }
}

/// Build the derived bundle for a fetch made at `now_ms`.
pub fn derive(raw: &RawMetrics, now_ms: u64) -> DerivedMetrics {
    let spot = raw.spot.as_ref();

    DerivedMetrics {
        price_now: last_close(&raw.candles_15m).or(raw.last_price),
        price_15m_ago: close_at_or_before(
            &raw.candles_15m,
            now_ms,
            CandleInterval::Min15.duration_ms(),
        ),
        price_4h_ago: close_at_or_before(
            &raw.candles_4h,
            now_ms,
            CandleInterval::Hour4.duration_ms(),
        ),
        funding_now: raw.funding.as_ref().and_then(|f| f.rate),
        // One period lag by construction.
        funding_prev: second_to_last(&raw.funding_history).map(|p| p.rate),
        open_interest_now: raw.open_interest,
        open_interest_4h_ago: second_to_last(&raw.open_interest_history)
            .map(|p| p.open_interest),
        net_flow: spot.and_then(|s| net_flow(s.volume_24h, s.taker_buy_volume_24h)),
    }
}

pub fn last_close(series: &[Candle]) -> Option<f64> {
    series.last().map(|c| c.close)
}

/// Close of the most recent candle that closed at or before
/// `now_ms - lookback_ms`; the first candle's close when none qualify.
///
/// An approximation, not interpolation: candle width ~ lookback width.
pub fn close_at_or_before(series: &[Candle], now_ms: u64, lookback_ms: u64) -> Option<f64> {
    let cutoff = now_ms.saturating_sub(lookback_ms);

    series
        .iter()
        .filter(|c| c.close_time_ms <= cutoff)
        .last()
        .or_else(|| series.first())
        .map(|c| c.close)
}

/// `(to - from) / from * 100`. `None` when either side is unknown or `from == 0`.
pub fn percent_change(from: Option<f64>, to: Option<f64>) -> Option<f64> {
    match (from, to) {
        (Some(from), Some(to)) if from != 0.0 => Some((to - from) / from * 100.0),
        _ => None,
    }
}

/// Taker buy minus synthesized taker sell (`total - buy`, floored at zero).
pub fn net_flow(total_volume: Option<f64>, taker_buy_volume: Option<f64>) -> Option<f64> {
    let (total, buy) = (total_volume?, taker_buy_volume?);
    Some(buy - (total - buy).max(0.0))
}

fn second_to_last<T>(items: &[T]) -> Option<&T> {
    items.len().checked_sub(2).and_then(|i| items.get(i))
}
