//! Spot venue fetchers.

use tracing::debug;

use super::{degrade, parse_num, price::fetch_candles};
use crate::transport::MarketDataTransport;
use crate::types::{CandleInterval, SpotAggregates, Venue};

/// Hourly candles summed into the 24h volume figures.
const SPOT_VOLUME_CANDLES: usize = 24;

/// 24h spot aggregates.
///
/// Volume and taker-buy volume are both summed from the same 24 hourly
/// candles so the net-flow proxy compares like with like; the ticker supplies
/// the price and a fallback volume. `None` only when both requests fail.
pub async fn fetch_spot_aggregates(
    transport: &dyn MarketDataTransport,
    symbol: &str,
) -> Option<SpotAggregates> {
    let (ticker, candles) = tokio::join!(
        transport.spot_ticker(symbol),
        fetch_candles(
            transport,
            Venue::Spot,
            symbol,
            CandleInterval::Hour1,
            SPOT_VOLUME_CANDLES
        ),
    );
    let ticker = degrade(ticker, "spot_ticker", Venue::Spot, symbol);

    if ticker.is_none() && candles.is_empty() {
        return None;
    }

    let (volume_24h, taker_buy_volume_24h) = if candles.is_empty() {
        (ticker.as_ref().and_then(|t| parse_num(&t.volume)), None)
    } else {
        (
            Some(candles.iter().map(|c| c.volume).sum()),
            Some(candles.iter().map(|c| c.taker_buy_volume).sum()),
        )
    };

    let aggregates = SpotAggregates {
        last_price: ticker.as_ref().and_then(|t| parse_num(&t.last_price)),
        volume_24h,
        taker_buy_volume_24h,
    };

    debug!(symbol, ?aggregates, "spot aggregates fetched");
    Some(aggregates)
}
