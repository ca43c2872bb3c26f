
use std::sync::Arc;

use market::{
    FaultKind, HistoryStore, Signal, SignalThresholds, SnapshotError, SnapshotService,
    VenueRegistry,
    types::{CandleInterval, Side, Venue},
};
use mock_transport::{H4, M15, MockTransport, NOW, breakout_market, candle, perpetual};

fn try_service(
    t: &Arc<MockTransport>,
    symbols: &[&str],
) -> Result<Arc<SnapshotService>, SnapshotError> {
    let registry = Arc::new(VenueRegistry::new(t.clone()));
    let history = Arc::new(HistoryStore::default());
    SnapshotService::new(
        t.clone(),
        registry,
        history,
        SignalThresholds::default(),
        symbols.iter().map(|s| s.to_string()).collect(),
    )
}

fn service(t: &Arc<MockTransport>, symbols: &[&str]) -> Arc<SnapshotService> {
    try_service(t, symbols).unwrap()
}

#[tokio::test]
async fn breakout_with_rising_oi_and_funding_flip_is_buy() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "XUSDT");
    let svc = service(&t, &["XUSDT"]);

    let s = svc.assemble_at("XUSDT", NOW).await;

    assert!(!s.is_degraded());
    assert_eq!(s.symbol, "XUSDT");
    assert_eq!(s.fetched_at_ms, NOW);
    assert_eq!(s.price, Some(104.0));
    assert_eq!(s.mark_price, Some(104.1));
    assert_eq!(s.funding_rate, Some(-0.0001));
    assert_eq!(s.open_interest, Some(1060.0));
    assert_eq!(s.deltas.price_change_15m_pct, Some(4.0));
    assert_eq!(s.deltas.open_interest_change_4h_pct, Some(6.0));
    assert_eq!(s.deltas.funding_rate_prev, Some(0.0002));
    // 24 hourly candles: 240 volume, 144 taker buy -> 144 - 96
    assert_eq!(s.deltas.net_flow, Some(48.0));

    let signal = s.signal.expect("scored");
    assert_eq!(signal.score, 5);
    assert_eq!(signal.signal, Signal::Buy);
    assert_eq!(signal.reasons.len(), 4);
    assert!(signal.reasons[3].contains("buy-dominant"));

    let venues = s.venues.expect("venues");
    assert!(venues.spot);
    assert!(venues.linear_futures);
    assert_eq!(venues.inverse_contract, None);
}

#[tokio::test]
async fn unlisted_instrument_is_null_and_neutral() {
    let t = Arc::new(MockTransport::new());
    let svc = service(&t, &["GHOSTUSDT"]);

    let s = svc.assemble_at("GHOSTUSDT", NOW).await;

    assert!(!s.is_degraded());
    assert_eq!(s.symbol, "GHOSTUSDT");
    assert_eq!(s.fetched_at_ms, NOW);
    assert!(s.price.is_none());
    assert!(s.mark_price.is_none());
    assert!(s.funding_rate.is_none());
    assert!(s.open_interest.is_none());
    assert!(s.spot.is_none());
    assert!(s.funding_history.is_empty());
    assert!(s.liquidations.is_empty());
    assert_eq!(s.deltas, Default::default());

    let signal = s.signal.unwrap();
    assert_eq!(signal.signal, Signal::Neutral);
    assert_eq!(signal.score, 0);
    assert!(signal.reasons.is_empty());

    // Nothing beyond the probes and the catalog was requested.
    assert_eq!(t.calls("candles"), 0);
    assert_eq!(t.calls("premium_index"), 0);
}

#[tokio::test]
async fn funding_failure_leaves_open_interest_intact() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "XUSDT");
    t.fail("premium_index");
    t.fail("funding_history");
    let svc = service(&t, &["XUSDT"]);

    let s = svc.assemble_at("XUSDT", NOW).await;

    assert!(!s.is_degraded());
    assert_eq!(s.funding_rate, None);
    assert_eq!(s.mark_price, None);
    assert!(s.funding_history.is_empty());
    assert_eq!(s.open_interest, Some(1060.0));
    assert_eq!(s.open_interest_history.len(), 3);

    let signal = s.signal.unwrap();
    // price +2, OI with rising price +2, no funding rules
    assert_eq!(signal.score, 4);
    assert_eq!(signal.reasons.len(), 3);
    assert!(signal.reasons.iter().all(|r| !r.contains("funding")));
}

#[tokio::test]
async fn spot_fetchers_skipped_when_not_spot_listed() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "XUSDT");
    t.unlist(Venue::Spot, "XUSDT");
    let svc = service(&t, &["XUSDT"]);

    let s = svc.assemble_at("XUSDT", NOW).await;

    assert_eq!(t.calls("spot_ticker"), 0);
    assert_eq!(t.calls_on("candles", Venue::Spot), 0);
    assert!(s.spot.is_none());
    assert_eq!(s.deltas.net_flow, None);
    assert_eq!(s.signal.unwrap().reasons.len(), 3);
}

#[tokio::test]
async fn inverse_contract_used_when_linear_missing() {
    let t = Arc::new(MockTransport::new());
    t.set_catalog(Some(vec![perpetual("XRPUSD_PERP", "XRP", 10.0)]));
    t.set_premium(Venue::InverseFutures, "XRPUSD_PERP", "0.5", "0.0001", NOW + 1);
    t.set_open_interest(Venue::InverseFutures, "XRPUSD_PERP", "1000");
    t.set_open_interest_history(
        Venue::InverseFutures,
        "XRPUSD_PERP",
        &[("900", "18000"), ("950", "19000")],
    );
    t.set_candles(
        Venue::InverseFutures,
        "XRPUSD_PERP",
        CandleInterval::Min15,
        vec![candle(NOW - M15, "0.5", "1", "1", M15)],
    );
    let svc = service(&t, &["XRPUSDT"]);

    let s = svc.assemble_at("XRPUSDT", NOW).await;

    let venues = s.venues.clone().unwrap();
    assert!(!venues.linear_futures);
    assert_eq!(venues.inverse_contract.as_deref(), Some("XRPUSD_PERP"));

    // 1000 contracts * 10 USD / 0.5 USD = 20_000 XRP
    assert_eq!(s.open_interest, Some(20_000.0));
    assert_eq!(s.open_interest_history[0].open_interest, 18_000.0);
    assert_eq!(s.deltas.open_interest_change_4h_pct, Some((20_000.0 - 18_000.0) / 18_000.0 * 100.0));
    assert_eq!(s.price, Some(0.5));
    assert_eq!(t.calls_on("premium_index", Venue::LinearFutures), 0);
    assert_eq!(t.calls_on("premium_index", Venue::InverseFutures), 1);
}

#[tokio::test]
async fn linear_futures_take_precedence_over_inverse() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "BTCUSDT");
    t.set_catalog(Some(vec![perpetual("BTCUSD_PERP", "BTC", 100.0)]));
    let svc = service(&t, &["BTCUSDT"]);

    let s = svc.assemble_at("BTCUSDT", NOW).await;

    assert_eq!(
        s.venues.unwrap().inverse_contract.as_deref(),
        Some("BTCUSD_PERP")
    );
    assert_eq!(t.calls_on("premium_index", Venue::InverseFutures), 0);
    assert_eq!(t.calls_on("open_interest", Venue::InverseFutures), 0);
    assert_eq!(t.calls_on("candles", Venue::InverseFutures), 0);
    assert_eq!(s.open_interest, Some(1060.0));
}

#[tokio::test]
async fn history_tails_are_trimmed() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "XUSDT");
    t.set_funding_history(
        Venue::LinearFutures,
        "XUSDT",
        &["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"],
    );
    t.set_liquidations(Venue::LinearFutures, "XUSDT", 30);
    let svc = service(&t, &["XUSDT"]);

    let s = svc.assemble_at("XUSDT", NOW).await;

    assert_eq!(s.funding_history.len(), 6);
    assert_eq!(s.funding_history.first().unwrap().rate, 5.0);
    assert_eq!(s.funding_history.last().unwrap().rate, 10.0);
    assert_eq!(s.liquidations.len(), 10);
    assert!(s.liquidations.windows(2).all(|w| w[0].ts_ms <= w[1].ts_ms));
    assert_eq!(s.liquidations.last().unwrap().side, Side::Buy);
}

#[tokio::test]
async fn venue_membership_is_resolved_once() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "XUSDT");
    let svc = service(&t, &["XUSDT"]);

    svc.assemble_at("XUSDT", NOW).await;
    svc.assemble_at("XUSDT", NOW + M15).await;

    assert_eq!(t.calls("probe_instrument"), 2);
    assert_eq!(t.calls("inverse_catalog"), 1);
    assert_eq!(t.calls_on("premium_index", Venue::LinearFutures), 2);
}

#[tokio::test]
async fn assembled_snapshots_accumulate_in_history() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "XUSDT");
    let svc = service(&t, &["XUSDT"]);

    svc.assemble_at("XUSDT", NOW).await;
    svc.assemble_at("xusdt", NOW + M15).await;

    let history = svc.get_history("XUSDT");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].fetched_at_ms, NOW);
    assert_eq!(history[1].fetched_at_ms, NOW + M15);
    assert!(svc.get_history("UNKNOWN").is_empty());
    assert!(svc.get_history("not valid!").is_empty());
}

#[tokio::test]
async fn history_drops_snapshots_older_than_a_day() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "XUSDT");
    let svc = service(&t, &["XUSDT"]);

    svc.assemble_at("XUSDT", NOW).await;
    svc.assemble_at("XUSDT", NOW + 3 * H4).await;
    svc.assemble_at("XUSDT", NOW + 7 * H4).await;

    let ts: Vec<u64> = svc.get_history("XUSDT").iter().map(|s| s.fetched_at_ms).collect();
    assert_eq!(ts, vec![NOW + 3 * H4, NOW + 7 * H4]);
}

#[tokio::test]
async fn get_now_serves_cache_and_assembles_on_miss() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "XUSDT");
    let svc = service(&t, &["XUSDT"]);

    let first = svc.get_now(&["XUSDT".to_string()]).await.unwrap();
    let calls_after_first = t.calls("premium_index");
    let second = svc.get_now(&["xusdt".to_string()]).await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
    assert_eq!(t.calls("premium_index"), calls_after_first);
    assert_eq!(svc.get_history("XUSDT").len(), 1);
}

#[tokio::test]
async fn get_now_without_instruments_is_an_error() {
    let t = Arc::new(MockTransport::new());
    let svc = service(&t, &["BTCUSDT"]);

    let err = svc.get_now(&[]).await.unwrap_err();
    assert_eq!(err, SnapshotError::NoInstruments);
}

#[tokio::test]
async fn invalid_instrument_yields_degraded_snapshot() {
    let t = Arc::new(MockTransport::new());
    let svc = service(&t, &["BTCUSDT"]);

    let s = svc.assemble_at(" BTC/USDT ", NOW).await;

    assert!(s.is_degraded());
    assert_eq!(s.symbol, "BTC/USDT");
    assert_eq!(s.error.unwrap().kind, FaultKind::InvalidInstrument);
    assert!(s.signal.is_none());
    assert_eq!(t.calls("probe_instrument"), 0);
    assert!(svc.history().symbols().is_empty());
}

#[tokio::test]
async fn panicking_pipeline_is_contained_and_recovers() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "XUSDT");
    let svc = service(&t, &["XUSDT"]);

    t.panic_on("open_interest");
    let broken = svc.assemble_at("XUSDT", NOW).await;

    assert!(broken.is_degraded());
    assert_eq!(broken.symbol, "XUSDT");
    assert_eq!(broken.fetched_at_ms, NOW);
    assert_eq!(broken.error.as_ref().unwrap().kind, FaultKind::Aborted);
    assert!(broken.price.is_none());
    assert!(broken.venues.is_none());

    t.calm("open_interest");
    let healthy = svc.assemble_at("XUSDT", NOW + M15).await;

    assert!(!healthy.is_degraded());
    assert_eq!(healthy.open_interest, Some(1060.0));
    assert_eq!(svc.get_history("XUSDT").len(), 2);
}

#[test]
fn invalid_tracked_symbols_are_dropped() {
    let t = Arc::new(MockTransport::new());
    let svc = service(&t, &["btcusdt", "", "ETH-USDT", " ethusdt "]);
    assert_eq!(svc.symbols(), &["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
}

#[test]
fn service_refuses_to_start_without_valid_instruments() {
    let t = Arc::new(MockTransport::new());

    assert_eq!(
        try_service(&t, &["BTC/USDT", "ETH-USDT"]).err(),
        Some(SnapshotError::NoInstruments)
    );
    assert_eq!(try_service(&t, &[]).err(), Some(SnapshotError::NoInstruments));
}
