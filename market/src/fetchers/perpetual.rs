//! Perpetual futures fetchers (linear and inverse).
//!
//! Inverse endpoints report open interest in contracts; it is converted to
//! base-asset units here so both venues feed the same snapshot shape.

use tracing::debug;

use super::{
    FUNDING_HISTORY_LEN, LIQUIDATION_FETCH_LIMIT, LIQUIDATION_TAIL_LEN, OPEN_INTEREST_HISTORY_LEN,
    degrade, parse_num, parse_num_or_zero, tail,
};
use crate::transport::{MarketDataTransport, RawLiquidation, RawOpenInterestHist};
use crate::types::{
    CandleInterval, FundingInfo, FundingPoint, Liquidation, OpenInterestPoint, Side, Venue,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerpetualMetrics {
    pub funding: Option<FundingInfo>,
    pub funding_history: Vec<FundingPoint>,
    /// Base-asset units.
    pub open_interest: Option<f64>,
    pub open_interest_history: Vec<OpenInterestPoint>,
    pub liquidations: Vec<Liquidation>,
}

/// Issue the five perpetual requests concurrently. A failure in one leaves
/// only its own field empty.
pub async fn fetch_perpetual_metrics(
    transport: &dyn MarketDataTransport,
    venue: Venue,
    symbol: &str,
    inverse_contract_size: Option<f64>,
) -> PerpetualMetrics {
    let (funding, funding_history, open_interest_contracts, open_interest_history, liquidations) = tokio::join!(
        fetch_funding(transport, venue, symbol),
        fetch_funding_history(transport, venue, symbol),
        fetch_open_interest(transport, venue, symbol),
        fetch_open_interest_history(transport, venue, symbol),
        fetch_liquidations(transport, venue, symbol),
    );

    let open_interest = match venue {
        Venue::InverseFutures => {
            let mark = funding.as_ref().and_then(|f| f.mark_price);
            inverse_to_base(open_interest_contracts, inverse_contract_size, mark)
        }
        _ => open_interest_contracts,
    };

    debug!(
        %venue,
        symbol,
        funding = ?funding.as_ref().and_then(|f| f.rate),
        open_interest,
        liquidations = liquidations.len(),
        "perpetual metrics fetched"
    );

    PerpetualMetrics {
        funding,
        funding_history,
        open_interest,
        open_interest_history,
        liquidations,
    }
}

pub async fn fetch_funding(
    transport: &dyn MarketDataTransport,
    venue: Venue,
    symbol: &str,
) -> Option<FundingInfo> {
    let raw = degrade(
        transport.premium_index(venue, symbol).await,
        "premium_index",
        venue,
        symbol,
    )?;

    Some(FundingInfo {
        rate: parse_num(&raw.last_funding_rate),
        next_funding_time_ms: (raw.next_funding_time > 0).then_some(raw.next_funding_time),
        mark_price: parse_num(&raw.mark_price).filter(|p| *p > 0.0),
    })
}

/// Last `FUNDING_HISTORY_LEN` settled rates, oldest first.
pub async fn fetch_funding_history(
    transport: &dyn MarketDataTransport,
    venue: Venue,
    symbol: &str,
) -> Vec<FundingPoint> {
    let raw = degrade(
        transport
            .funding_history(venue, symbol, FUNDING_HISTORY_LEN)
            .await,
        "funding_history",
        venue,
        symbol,
    )
    .unwrap_or_default();

    let mut points: Vec<FundingPoint> = raw
        .into_iter()
        .filter_map(|r| {
            Some(FundingPoint {
                funding_time_ms: r.funding_time,
                rate: parse_num(&r.funding_rate)?,
            })
        })
        .collect();
    points.sort_by_key(|p| p.funding_time_ms);

    tail(points, FUNDING_HISTORY_LEN)
}

/// Current open interest as reported (contracts on the inverse venue).
pub async fn fetch_open_interest(
    transport: &dyn MarketDataTransport,
    venue: Venue,
    symbol: &str,
) -> Option<f64> {
    degrade(
        transport.open_interest(venue, symbol).await,
        "open_interest",
        venue,
        symbol,
    )
    .and_then(|r| parse_num(&r.open_interest))
}

/// 4h-bucketed open interest in base units, oldest first.
pub async fn fetch_open_interest_history(
    transport: &dyn MarketDataTransport,
    venue: Venue,
    symbol: &str,
) -> Vec<OpenInterestPoint> {
    let raw = degrade(
        transport
            .open_interest_history(
                venue,
                symbol,
                CandleInterval::Hour4,
                OPEN_INTEREST_HISTORY_LEN,
            )
            .await,
        "open_interest_history",
        venue,
        symbol,
    )
    .unwrap_or_default();

    let mut points: Vec<OpenInterestPoint> = raw
        .iter()
        .filter_map(|r| normalize_open_interest_point(venue, r))
        .collect();
    points.sort_by_key(|p| p.ts_ms);

    tail(points, OPEN_INTEREST_HISTORY_LEN)
}

/// Most recent `LIQUIDATION_TAIL_LEN` forced orders, oldest first.
pub async fn fetch_liquidations(
    transport: &dyn MarketDataTransport,
    venue: Venue,
    symbol: &str,
) -> Vec<Liquidation> {
    let raw = degrade(
        transport
            .liquidations(venue, symbol, LIQUIDATION_FETCH_LIMIT)
            .await,
        "liquidations",
        venue,
        symbol,
    )
    .unwrap_or_default();

    let mut events: Vec<Liquidation> = raw.iter().filter_map(normalize_liquidation).collect();
    events.sort_by_key(|l| l.ts_ms);

    tail(events, LIQUIDATION_TAIL_LEN)
}

fn normalize_open_interest_point(venue: Venue, raw: &RawOpenInterestHist) -> Option<OpenInterestPoint> {
    let field = match venue {
        Venue::InverseFutures => &raw.sum_open_interest_value,
        _ => &raw.sum_open_interest,
    };

    Some(OpenInterestPoint {
        ts_ms: raw.timestamp,
        open_interest: parse_num(field)?,
    })
}

fn normalize_liquidation(raw: &RawLiquidation) -> Option<Liquidation> {
    Some(Liquidation {
        ts_ms: raw.time,
        side: Side::parse(&raw.side)?,
        price: parse_num_or_zero(&raw.average_price),
        quantity: parse_num_or_zero(&raw.executed_qty),
    })
}

/// contracts * contract_size (quote) / mark (quote per base) = base units.
pub fn inverse_to_base(
    contracts: Option<f64>,
    contract_size: Option<f64>,
    mark_price: Option<f64>,
) -> Option<f64> {
    match (contracts, contract_size, mark_price) {
        (Some(n), Some(size), Some(mark)) if mark > 0.0 => Some(n * size / mark),
        _ => None,
    }
}
