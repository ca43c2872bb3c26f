//! History Store
//!
//! Per-instrument, insertion-ordered window of past snapshots.
//!
//! Guarantees:
//! - Every retained snapshot satisfies
//!   `fetched_at_ms >= last_appended.fetched_at_ms - window`, whatever
//!   order the appends arrive in.
//! - Pruning happens on append only; reads never mutate.
//! - Each instrument has its own lock, so a write on one instrument never
//!   blocks readers of another.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::snapshot::Snapshot;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

type Buffer = Arc<RwLock<VecDeque<Snapshot>>>;

pub struct HistoryStore {
    window_ms: u64,
    buffers: RwLock<HashMap<String, Buffer>>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl HistoryStore {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: window.as_millis() as u64,
            buffers: RwLock::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Append at the tail, then drop everything older than the window,
    /// measured from the appended snapshot's fetch time.
    ///
    /// Appends can arrive out of fetch order when an on-demand assembly
    /// races a poll pass, so the whole buffer is pruned, not just the front.
    #[instrument(skip(self, snapshot), target = "history", level = "debug", fields(ts_ms = snapshot.fetched_at_ms))]
    pub fn append(&self, symbol: &str, snapshot: Snapshot) {
        let buffer = self.buffer_for(symbol);
        let ts = snapshot.fetched_at_ms;
        let cutoff = ts.saturating_sub(self.window_ms);

        let mut buf = buffer.write();
        buf.push_back(snapshot);

        let before = buf.len();
        buf.retain(|s| s.fetched_at_ms >= cutoff);
        let pruned = before - buf.len();

        debug!(len = buf.len(), pruned, "snapshot appended");
    }

    /// Retained window in insertion order. Empty for unknown instruments.
    pub fn read(&self, symbol: &str) -> Vec<Snapshot> {
        self.existing(symbol)
            .map(|b| b.read().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recently appended snapshot.
    pub fn latest(&self, symbol: &str) -> Option<Snapshot> {
        self.existing(symbol).and_then(|b| b.read().back().cloned())
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.existing(symbol).map(|b| b.read().len()).unwrap_or(0)
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = self.buffers.read().keys().cloned().collect();
        out.sort();
        out
    }

    /// Drop all buffers.
    pub fn reset(&self) {
        self.buffers.write().clear();
    }

    fn existing(&self, symbol: &str) -> Option<Buffer> {
        self.buffers.read().get(symbol).cloned()
    }

    fn buffer_for(&self, symbol: &str) -> Buffer {
        if let Some(b) = self.existing(symbol) {
            return b;
        }
        self.buffers
            .write()
            .entry(symbol.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HOUR: u64 = 3_600_000;

    fn snap(ts: u64) -> Snapshot {
        Snapshot {
            symbol: "BTCUSDT".into(),
            fetched_at_ms: ts,
            ..Default::default()
        }
    }

    #[test]
    fn unknown_symbol_reads_empty() {
        let h = HistoryStore::default();
        assert!(h.read("NOPE").is_empty());
        assert!(h.latest("NOPE").is_none());
        assert_eq!(h.len("NOPE"), 0);
    }

    #[test]
    fn append_keeps_insertion_order() {
        let h = HistoryStore::default();
        h.append("BTCUSDT", snap(1));
        h.append("BTCUSDT", snap(2));
        h.append("BTCUSDT", snap(3));

        let ts: Vec<u64> = h.read("BTCUSDT").iter().map(|s| s.fetched_at_ms).collect();
        assert_eq!(ts, vec![1, 2, 3]);
        assert_eq!(h.latest("BTCUSDT").unwrap().fetched_at_ms, 3);
    }

    #[test]
    fn entries_older_than_window_are_pruned_on_append() {
        let h = HistoryStore::new(Duration::from_millis(24 * HOUR));
        h.append("BTCUSDT", snap(0));
        h.append("BTCUSDT", snap(12 * HOUR));
        h.append("BTCUSDT", snap(24 * HOUR)); // exactly at the edge: 0 survives
        assert_eq!(h.len("BTCUSDT"), 3);

        h.append("BTCUSDT", snap(24 * HOUR + 1));
        let ts: Vec<u64> = h.read("BTCUSDT").iter().map(|s| s.fetched_at_ms).collect();
        assert_eq!(ts, vec![12 * HOUR, 24 * HOUR, 24 * HOUR + 1]);
    }

    #[test]
    fn stale_entries_behind_newer_ones_are_pruned() {
        let h = HistoryStore::new(Duration::from_millis(1_000));
        h.append("BTCUSDT", snap(1_000));
        h.append("BTCUSDT", snap(500));
        h.append("BTCUSDT", snap(1_800));

        let ts: Vec<u64> = h.read("BTCUSDT").iter().map(|s| s.fetched_at_ms).collect();
        assert_eq!(ts, vec![1_000, 1_800]);

        h.append("BTCUSDT", snap(1_200));
        let ts: Vec<u64> = h.read("BTCUSDT").iter().map(|s| s.fetched_at_ms).collect();
        assert_eq!(ts, vec![1_000, 1_800, 1_200]);
        assert_eq!(h.latest("BTCUSDT").unwrap().fetched_at_ms, 1_200);
    }

    #[test]
    fn instruments_are_isolated() {
        let h = HistoryStore::default();
        h.append("BTCUSDT", snap(1));
        h.append("ETHUSDT", snap(2));
        assert_eq!(h.len("BTCUSDT"), 1);
        assert_eq!(h.len("ETHUSDT"), 1);
        assert_eq!(h.symbols(), vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
    }

    #[test]
    fn reset_clears_everything() {
        let h = HistoryStore::default();
        h.append("BTCUSDT", snap(1));
        h.reset();
        assert!(h.read("BTCUSDT").is_empty());
        assert!(h.symbols().is_empty());
    }

    #[test]
    fn buffer_is_bounded_under_steady_polling() {
        let h = HistoryStore::new(Duration::from_millis(HOUR));
        let step = 60_000;
        for i in 0..500u64 {
            h.append("BTCUSDT", snap(i * step));
        }
        // 60 minutes back plus the current one.
        assert_eq!(h.len("BTCUSDT"), 61);
    }

    proptest! {
        #[test]
        fn retained_snapshots_are_within_window(
            steps in proptest::collection::vec(0u64..(6 * HOUR), 1..200),
            window_h in 1u64..48,
        ) {
            let h = HistoryStore::new(Duration::from_millis(window_h * HOUR));
            let mut ts = 0u64;
            for step in steps {
                ts += step;
                h.append("BTCUSDT", snap(ts));
                let cutoff = ts.saturating_sub(window_h * HOUR);
                prop_assert!(h.read("BTCUSDT").iter().all(|s| s.fetched_at_ms >= cutoff));
                prop_assert_eq!(h.latest("BTCUSDT").unwrap().fetched_at_ms, ts);
            }
        }

        #[test]
        fn out_of_order_appends_stay_within_window(
            stamps in proptest::collection::vec(0u64..(72 * HOUR), 1..200),
            window_h in 1u64..48,
        ) {
            let h = HistoryStore::new(Duration::from_millis(window_h * HOUR));
            for ts in stamps {
                h.append("BTCUSDT", snap(ts));
                let cutoff = ts.saturating_sub(window_h * HOUR);
                let kept: Vec<u64> = h.read("BTCUSDT").iter().map(|s| s.fetched_at_ms).collect();
                prop_assert!(kept.iter().all(|t| *t >= cutoff));
                prop_assert_eq!(kept.last().copied(), Some(ts));
            }
        }
    }
}
