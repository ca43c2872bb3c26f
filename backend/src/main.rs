use std::sync::Arc;

use anyhow::Context;
use backend::{binance::BinanceClient, config::AppConfig};
use common::logger::init_logger;
use market::{HistoryStore, MarketDataTransport, Poller, SnapshotService, VenueRegistry};

fn build_transport(cfg: &AppConfig) -> anyhow::Result<Arc<dyn MarketDataTransport>> {
    let client = BinanceClient::new(
        cfg.spot_base_url.clone(),
        cfg.linear_base_url.clone(),
        cfg.inverse_base_url.clone(),
        cfg.http_timeout,
    )
    .context("failed to build binance http client")?;

    Ok(Arc::new(client))
}

fn build_service(
    cfg: &AppConfig,
    transport: Arc<dyn MarketDataTransport>,
) -> anyhow::Result<Arc<SnapshotService>> {
    let registry = Arc::new(VenueRegistry::new(Arc::clone(&transport)));
    let history = Arc::new(HistoryStore::new(cfg.history_window));

    SnapshotService::new(
        transport,
        registry,
        history,
        cfg.thresholds(),
        cfg.symbols.clone(),
    )
    .context("no instruments to track")
}

/// Logs every finished cycle's signals at debug level.
fn start_cycle_logger(poller: &Poller) {
    let mut events = poller.subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(cycle) => {
                    for s in &cycle.snapshots {
                        tracing::debug!(
                            tick = cycle.tick,
                            symbol = %s.symbol,
                            signal = ?s.signal.as_ref().map(|r| r.signal),
                            score = ?s.signal.as_ref().map(|r| r.score),
                            "signal"
                        );
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "cycle logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger("backend");

    tracing::info!("Starting snapshot backend...");

    let cfg = AppConfig::from_env().context("invalid configuration")?;

    let transport = build_transport(&cfg)?;
    let service = build_service(&cfg, transport)?;
    let poller = Arc::new(Poller::new(Arc::clone(&service), cfg.poll_interval));

    start_cycle_logger(&poller);
    let poll_task = tokio::spawn(Arc::clone(&poller).run());

    tracing::info!(
        symbols = ?service.symbols(),
        history_window_secs = service.history().window().as_secs(),
        port = cfg.port,
        "poller running; port is reserved for the routing layer"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    poll_task.abort();
    Ok(())
}
