//! Periodic poll driver.
//!
//! Runs one sequential pass over all tracked instruments per interval and
//! publishes a `PollCycle` after each pass. A failed fetch is simply
//! re-attempted on the next tick; there is no other retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use common::time::now_ms;
use tokio::sync::broadcast;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::orchestrator::SnapshotService;
use crate::snapshot::Snapshot;

const CYCLE_CHANNEL_CAPACITY: usize = 16;

/// Completion event of one poll pass.
#[derive(Debug, Clone)]
pub struct PollCycle {
    /// 1-based pass counter.
    pub tick: u64,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
    pub snapshots: Vec<Snapshot>,
}

impl PollCycle {
    pub fn degraded(&self) -> usize {
        self.snapshots.iter().filter(|s| s.is_degraded()).count()
    }

    pub fn snapshot(&self, symbol: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.symbol == symbol)
    }
}

pub struct Poller {
    service: Arc<SnapshotService>,
    every: Duration,
    ticks: AtomicU64,
    events: broadcast::Sender<PollCycle>,
}

impl Poller {
    pub fn new(service: Arc<SnapshotService>, every: Duration) -> Self {
        let (events, _) = broadcast::channel(CYCLE_CHANNEL_CAPACITY);
        Self {
            service,
            every,
            ticks: AtomicU64::new(0),
            events,
        }
    }

    /// Receive every subsequent `PollCycle`.
    pub fn subscribe(&self) -> broadcast::Receiver<PollCycle> {
        self.events.subscribe()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// One full pass; publishes and returns its completion event.
    pub async fn run_cycle(&self) -> PollCycle {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let started_at_ms = now_ms();

        let snapshots = self.service.poll_once().await;

        let cycle = PollCycle {
            tick,
            started_at_ms,
            finished_at_ms: now_ms(),
            snapshots,
        };

        if cycle.degraded() > 0 {
            warn!(tick, degraded = cycle.degraded(), "poll cycle finished with degraded snapshots");
        } else {
            info!(
                tick,
                instruments = cycle.snapshots.len(),
                elapsed_ms = cycle.finished_at_ms.saturating_sub(started_at_ms),
                "poll cycle finished"
            );
        }

        // No subscribers is fine.
        let _ = self.events.send(cycle.clone());
        cycle
    }

    /// Poll forever. The first pass runs immediately (startup), later passes
    /// every `every`. Passes never overlap.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            instruments = self.service.symbols().len(),
            every_ms = self.every.as_millis() as u64,
            "snapshot poller started"
        );

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }
}
