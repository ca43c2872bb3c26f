//! Candle series and last-trade price, for any venue.

use tracing::debug;

use super::{CANDLES_4H_LIMIT, CANDLES_15M_LIMIT, degrade, interval_label, parse_num};
use crate::transport::{MarketDataTransport, RawCandle};
use crate::types::{Candle, CandleInterval, Venue};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub candles_15m: Vec<Candle>,
    pub candles_4h: Vec<Candle>,
    pub last_price: Option<f64>,
}

pub async fn fetch_price_series(
    transport: &dyn MarketDataTransport,
    venue: Venue,
    symbol: &str,
) -> PriceSeries {
    let (candles_15m, candles_4h, last_price) = tokio::join!(
        fetch_candles(transport, venue, symbol, CandleInterval::Min15, CANDLES_15M_LIMIT),
        fetch_candles(transport, venue, symbol, CandleInterval::Hour4, CANDLES_4H_LIMIT),
        fetch_last_price(transport, venue, symbol),
    );

    PriceSeries {
        candles_15m,
        candles_4h,
        last_price,
    }
}

/// Chronologically ordered candles; rows whose close is unparseable are dropped.
pub async fn fetch_candles(
    transport: &dyn MarketDataTransport,
    venue: Venue,
    symbol: &str,
    interval: CandleInterval,
    limit: usize,
) -> Vec<Candle> {
    let raw = degrade(
        transport.candles(venue, symbol, interval, limit).await,
        interval_label(interval),
        venue,
        symbol,
    )
    .unwrap_or_default();

    let mut candles: Vec<Candle> = raw.iter().filter_map(normalize_candle).collect();
    candles.sort_by_key(|c| c.open_time_ms);

    debug!(%venue, symbol, %interval, count = candles.len(), "candles fetched");
    candles
}

pub async fn fetch_last_price(
    transport: &dyn MarketDataTransport,
    venue: Venue,
    symbol: &str,
) -> Option<f64> {
    degrade(
        transport.last_price(venue, symbol).await,
        "last_price",
        venue,
        symbol,
    )
    .and_then(|p| parse_num(&p.price))
}

pub(crate) fn normalize_candle(raw: &RawCandle) -> Option<Candle> {
    Some(Candle {
        open_time_ms: raw.open_time,
        close_time_ms: raw.close_time,
        close: parse_num(&raw.close)?,
        volume: parse_num(&raw.volume).unwrap_or(0.0),
        taker_buy_volume: parse_num(&raw.taker_buy_base_volume).unwrap_or(0.0),
    })
}
