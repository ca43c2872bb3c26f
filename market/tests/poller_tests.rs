
use std::sync::Arc;
use std::time::Duration;

use market::{
    FaultKind, HistoryStore, Poller, SignalThresholds, SnapshotService, VenueRegistry,
};
use mock_transport::{MockTransport, breakout_market};

fn poller(t: &Arc<MockTransport>, symbols: &[&str], every: Duration) -> Arc<Poller> {
    let service = SnapshotService::new(
        t.clone(),
        Arc::new(VenueRegistry::new(t.clone())),
        Arc::new(HistoryStore::default()),
        SignalThresholds::default(),
        symbols.iter().map(|s| s.to_string()).collect(),
    )
    .unwrap();
    Arc::new(Poller::new(service, every))
}

#[tokio::test]
async fn failure_at_one_tick_recovers_on_the_next() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "XUSDT");
    let p = poller(&t, &["XUSDT"], Duration::from_secs(60));
    let mut events = p.subscribe();

    t.fail("premium_index");
    let first = p.run_cycle().await;
    t.recover("premium_index");
    let second = p.run_cycle().await;

    assert_eq!(first.tick, 1);
    assert_eq!(second.tick, 2);
    assert_eq!(first.snapshot("XUSDT").unwrap().funding_rate, None);
    assert_eq!(second.snapshot("XUSDT").unwrap().funding_rate, Some(-0.0001));
    // Fetch failures degrade the metric, not the snapshot.
    assert_eq!(first.degraded(), 0);

    let e1 = events.recv().await.unwrap();
    let e2 = events.recv().await.unwrap();
    assert_eq!((e1.tick, e2.tick), (1, 2));
    assert!(e1.finished_at_ms >= e1.started_at_ms);
    assert_eq!(p.ticks(), 2);
}

#[tokio::test]
async fn one_broken_instrument_does_not_abort_the_cycle() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "AUSDT");
    breakout_market(&t, "BUSDT");
    let p = poller(&t, &["AUSDT", "BUSDT"], Duration::from_secs(60));

    t.panic_on("liquidations");
    let cycle = p.run_cycle().await;

    assert_eq!(cycle.snapshots.len(), 2);
    assert_eq!(cycle.degraded(), 2);
    assert!(
        cycle
            .snapshots
            .iter()
            .all(|s| s.error.as_ref().unwrap().kind == FaultKind::Aborted)
    );

    t.calm("liquidations");
    let cycle = p.run_cycle().await;
    assert_eq!(cycle.degraded(), 0);
}

#[tokio::test(start_paused = true)]
async fn run_loop_polls_immediately_then_every_interval() {
    let t = Arc::new(MockTransport::new());
    breakout_market(&t, "XUSDT");
    let p = poller(&t, &["XUSDT"], Duration::from_secs(30));
    let mut events = p.subscribe();

    let handle = tokio::spawn(Arc::clone(&p).run());

    let startup = events.recv().await.unwrap();
    let next = events.recv().await.unwrap();
    let third = events.recv().await.unwrap();
    handle.abort();

    assert_eq!(startup.tick, 1);
    assert_eq!(next.tick, 2);
    assert_eq!(third.tick, 3);
    assert!(third.snapshot("XUSDT").is_some());
}
