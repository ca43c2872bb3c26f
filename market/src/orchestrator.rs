//! Snapshot Orchestrator
//!
//! Composes venue resolution, fetching, deltas and scoring for one
//! instrument, writes the result into the history store and returns it.
//! Nothing here returns an error for a single instrument: failures become
//! degraded snapshots.

use std::sync::Arc;
use std::time::Duration;

use common::logger::{TraceId, annotate_symbol, root_span, warn_if_slow};
use common::time::now_ms;
use tracing::{Instrument, debug, error, field, info, instrument, warn};

use crate::delta;
use crate::error::SnapshotError;
use crate::fetchers::{self, FUNDING_HISTORY_LEN, LIQUIDATION_TAIL_LEN, OPEN_INTEREST_HISTORY_LEN, tail};
use crate::history::HistoryStore;
use crate::signal::{self, SignalThresholds};
use crate::snapshot::Snapshot;
use crate::transport::MarketDataTransport;
use crate::venues::VenueRegistry;

/// Assembly slower than this is logged under the `performance` target.
const SLOW_ASSEMBLY: Duration = Duration::from_secs(10);

pub struct SnapshotService {
    transport: Arc<dyn MarketDataTransport>,
    registry: Arc<VenueRegistry>,
    history: Arc<HistoryStore>,
    thresholds: SignalThresholds,
    /// Instruments driven by `poll_once`, normalized.
    symbols: Vec<String>,
}

impl SnapshotService {
    /// Invalid entries in `symbols` are dropped with a warning. Fails with
    /// `NoInstruments` when nothing valid is left to track.
    pub fn new(
        transport: Arc<dyn MarketDataTransport>,
        registry: Arc<VenueRegistry>,
        history: Arc<HistoryStore>,
        thresholds: SignalThresholds,
        symbols: Vec<String>,
    ) -> Result<Arc<Self>, SnapshotError> {
        let symbols: Vec<String> = symbols
            .iter()
            .filter_map(|raw| match normalize_symbol(raw) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(error = %e, "ignoring tracked instrument");
                    None
                }
            })
            .collect();

        if symbols.is_empty() {
            return Err(SnapshotError::NoInstruments);
        }

        Ok(Arc::new(Self {
            transport,
            registry,
            history,
            thresholds,
            symbols,
        }))
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Assemble a fresh snapshot for `symbol` at the current time.
    pub async fn assemble(self: &Arc<Self>, symbol: &str) -> Snapshot {
        self.assemble_at(symbol, now_ms()).await
    }

    /// Assemble as if fetched at `now_ms`, append to history, return it.
    ///
    /// The pipeline runs in its own task; a panic inside it is turned into a
    /// degraded snapshot instead of reaching the caller.
    #[instrument(skip(self, symbol), target = "orchestrator", fields(symbol = field::Empty))]
    pub async fn assemble_at(self: &Arc<Self>, symbol: &str, now_ms: u64) -> Snapshot {
        let symbol = match normalize_symbol(symbol) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "rejecting instrument");
                return Snapshot::degraded(symbol.trim(), now_ms, &e);
            }
        };
        annotate_symbol(&symbol);

        let this = Arc::clone(self);
        let task_symbol = symbol.clone();
        let task = tokio::spawn(
            async move { this.build(&task_symbol, now_ms).await }.in_current_span(),
        );

        let snapshot = match warn_if_slow("assemble_snapshot", SLOW_ASSEMBLY, task).await {
            Ok(snapshot) => snapshot,
            Err(join_err) => {
                error!(error = %join_err, "snapshot assembly aborted");
                Snapshot::degraded(
                    symbol.as_str(),
                    now_ms,
                    &SnapshotError::Aborted(join_err.to_string()),
                )
            }
        };

        self.history.append(&symbol, snapshot.clone());
        snapshot
    }

    /// Latest cached snapshot per instrument, assembling on a cache miss.
    pub async fn get_now(self: &Arc<Self>, symbols: &[String]) -> Result<Vec<Snapshot>, SnapshotError> {
        if symbols.is_empty() {
            return Err(SnapshotError::NoInstruments);
        }

        let span = root_span("get_now", &TraceId::new());
        async {
            let mut out = Vec::with_capacity(symbols.len());
            for raw in symbols {
                let cached = normalize_symbol(raw)
                    .ok()
                    .and_then(|s| self.history.latest(&s));

                match cached {
                    Some(snapshot) => {
                        debug!(symbol = %snapshot.symbol, "serving cached snapshot");
                        out.push(snapshot);
                    }
                    None => out.push(self.assemble(raw).await),
                }
            }
            Ok(out)
        }
        .instrument(span)
        .await
    }

    /// Retained window for `symbol`; empty if unknown or invalid.
    pub fn get_history(&self, symbol: &str) -> Vec<Snapshot> {
        normalize_symbol(symbol)
            .map(|s| self.history.read(&s))
            .unwrap_or_default()
    }

    /// One sequential pass over every tracked instrument.
    pub async fn poll_once(self: &Arc<Self>) -> Vec<Snapshot> {
        let trace_id = TraceId::new();
        let span = root_span("poll_once", &trace_id);

        async {
            let mut out = Vec::with_capacity(self.symbols.len());
            for symbol in &self.symbols {
                out.push(self.assemble(symbol).await);
            }

            info!(
                instruments = out.len(),
                degraded = out.iter().filter(|s| s.is_degraded()).count(),
                "poll pass complete"
            );
            out
        }
        .instrument(span)
        .await
    }

    async fn build(&self, symbol: &str, now_ms: u64) -> Snapshot {
        let venues = self.registry.resolve(symbol).await;
        if !venues.is_listed_anywhere() {
            info!("instrument not listed on any venue; snapshot will be empty");
        }

        let contract_size = match (&venues.inverse_contract, venues.linear_futures) {
            (Some(contract), false) => self.registry.contract_size(contract).await,
            _ => None,
        };

        let raw = fetchers::collect(self.transport.as_ref(), symbol, &venues, contract_size).await;

        let derived = delta::derive(&raw, now_ms);
        let deltas = derived.deltas();
        let signal = signal::score(&deltas, &self.thresholds);

        debug!(
            signal = ?signal.signal,
            score = signal.score,
            reasons = signal.reasons.len(),
            "snapshot scored"
        );

        let funding = raw.funding.as_ref();

        Snapshot {
            symbol: symbol.to_string(),
            fetched_at_ms: now_ms,
            price: derived.price_now,
            mark_price: funding.and_then(|f| f.mark_price),
            funding_rate: derived.funding_now,
            next_funding_time_ms: funding.and_then(|f| f.next_funding_time_ms),
            open_interest: derived.open_interest_now,
            spot: raw.spot,
            deltas,
            funding_history: tail(raw.funding_history, FUNDING_HISTORY_LEN),
            open_interest_history: tail(raw.open_interest_history, OPEN_INTEREST_HISTORY_LEN),
            liquidations: tail(raw.liquidations, LIQUIDATION_TAIL_LEN),
            signal: Some(signal),
            venues: Some(venues),
            error: None,
        }
    }
}

/// Trim and upper-case; only ASCII alphanumerics are accepted.
pub fn normalize_symbol(raw: &str) -> Result<String, SnapshotError> {
    let symbol = raw.trim().to_ascii_uppercase();
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(SnapshotError::InvalidInstrument(raw.to_string()));
    }
    Ok(symbol)
}
