//! Venue Registry.
//!
//! Caches, per instrument, which venues list it. Entries are created on first
//! lookup and never re-validated: a delisting or a new listing is only seen
//! after a restart (or `reset`).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::transport::{InverseContract, MarketDataTransport};
use crate::types::Venue;

/// Quote suffixes stripped to derive the base asset, longest first.
const QUOTE_SUFFIXES: [&str; 5] = ["FDUSD", "USDT", "USDC", "BUSD", "USD"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueMembership {
    pub spot: bool,
    pub linear_futures: bool,
    /// Inverse perpetual contract id, e.g. `BTCUSD_PERP`.
    pub inverse_contract: Option<String>,
}

impl VenueMembership {
    /// Venue and venue-local symbol used for futures metrics.
    /// Linear futures take precedence over the inverse contract.
    pub fn futures_venue<'a>(&'a self, symbol: &'a str) -> Option<(Venue, &'a str)> {
        if self.linear_futures {
            Some((Venue::LinearFutures, symbol))
        } else {
            self.inverse_contract
                .as_deref()
                .map(|contract| (Venue::InverseFutures, contract))
        }
    }

    /// Venue used for the price series: futures first, then spot.
    pub fn price_venue<'a>(&'a self, symbol: &'a str) -> Option<(Venue, &'a str)> {
        self.futures_venue(symbol)
            .or(self.spot.then_some((Venue::Spot, symbol)))
    }

    pub fn is_listed_anywhere(&self) -> bool {
        self.spot || self.linear_futures || self.inverse_contract.is_some()
    }
}

/// Strip the quote-currency suffix: `BTCUSDT` -> `BTC`.
pub fn base_asset(symbol: &str) -> &str {
    QUOTE_SUFFIXES
        .iter()
        .find_map(|suffix| {
            symbol
                .strip_suffix(suffix)
                .filter(|base| !base.is_empty())
        })
        .unwrap_or(symbol)
}

pub struct VenueRegistry {
    transport: Arc<dyn MarketDataTransport>,

    /// Membership per instrument.
    members: RwLock<HashMap<String, VenueMembership>>,

    /// Inverse perpetuals keyed by base asset. Held across the catalog
    /// fetch so concurrent first lookups share one scan.
    inverse: Mutex<HashMap<String, InverseContract>>,
}

impl VenueRegistry {
    pub fn new(transport: Arc<dyn MarketDataTransport>) -> Self {
        Self {
            transport,
            members: RwLock::new(HashMap::new()),
            inverse: Mutex::new(HashMap::new()),
        }
    }

    /// Cached membership, without probing.
    pub fn cached(&self, symbol: &str) -> Option<VenueMembership> {
        self.members.read().get(symbol).cloned()
    }

    #[instrument(skip(self), target = "venues", level = "debug")]
    pub async fn resolve(&self, symbol: &str) -> VenueMembership {
        if let Some(m) = self.cached(symbol) {
            debug!("venue membership cache hit");
            return m;
        }

        let (spot, linear_futures, inverse_contract) = tokio::join!(
            self.probe(Venue::Spot, symbol),
            self.probe(Venue::LinearFutures, symbol),
            self.inverse_contract_for(symbol),
        );

        let membership = VenueMembership {
            spot,
            linear_futures,
            inverse_contract: inverse_contract.map(|c| c.symbol),
        };

        info!(
            spot = membership.spot,
            linear_futures = membership.linear_futures,
            inverse = ?membership.inverse_contract,
            "venue membership resolved"
        );

        // A concurrent resolver may have won; keep the first entry.
        self.members
            .write()
            .entry(symbol.to_string())
            .or_insert(membership)
            .clone()
    }

    /// Contract size of a cataloged inverse perpetual.
    pub async fn contract_size(&self, contract: &str) -> Option<f64> {
        self.inverse
            .lock()
            .await
            .values()
            .find(|c| c.symbol == contract)
            .map(|c| c.contract_size)
    }

    /// Drop every cached entry. Used by tests and operator tooling.
    pub async fn reset(&self) {
        self.members.write().clear();
        self.inverse.lock().await.clear();
    }

    async fn probe(&self, venue: Venue, symbol: &str) -> bool {
        match self.transport.probe_instrument(venue, symbol).await {
            Ok(()) => true,
            Err(e) => {
                debug!(%venue, error = %e, "instrument probe failed; treating as not listed");
                false
            }
        }
    }

    async fn inverse_contract_for(&self, symbol: &str) -> Option<InverseContract> {
        let mut catalog = self.inverse.lock().await;

        if catalog.is_empty() {
            match self.transport.inverse_catalog().await {
                Ok(contracts) => {
                    catalog.extend(
                        contracts
                            .into_iter()
                            .filter(InverseContract::is_perpetual)
                            .map(|c| (c.base_asset.to_ascii_uppercase(), c)),
                    );
                    info!(contracts = catalog.len(), "inverse perpetual catalog loaded");
                }
                Err(e) => {
                    warn!(error = %e, "inverse catalog unavailable; inverse treated as unsupported");
                }
            }
        }

        catalog.get(base_asset(symbol)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_asset_strips_longest_suffix() {
        assert_eq!(base_asset("BTCUSDT"), "BTC");
        assert_eq!(base_asset("ETHFDUSD"), "ETH");
        assert_eq!(base_asset("SOLUSD"), "SOL");
        assert_eq!(base_asset("BNBBUSD"), "BNB");
    }

    #[test]
    fn base_asset_keeps_unknown_or_bare_quote() {
        assert_eq!(base_asset("BTCETH"), "BTCETH");
        assert_eq!(base_asset("USDT"), "USDT");
    }

    #[test]
    fn linear_futures_take_precedence() {
        let m = VenueMembership {
            spot: true,
            linear_futures: true,
            inverse_contract: Some("BTCUSD_PERP".into()),
        };
        assert_eq!(
            m.futures_venue("BTCUSDT"),
            Some((Venue::LinearFutures, "BTCUSDT"))
        );
    }

    #[test]
    fn inverse_used_when_linear_missing() {
        let m = VenueMembership {
            spot: false,
            linear_futures: false,
            inverse_contract: Some("XRPUSD_PERP".into()),
        };
        assert_eq!(
            m.futures_venue("XRPUSDT"),
            Some((Venue::InverseFutures, "XRPUSD_PERP"))
        );
        assert_eq!(
            m.price_venue("XRPUSDT"),
            Some((Venue::InverseFutures, "XRPUSD_PERP"))
        );
    }

    #[test]
    fn spot_only_prices_from_spot() {
        let m = VenueMembership {
            spot: true,
            ..Default::default()
        };
        assert_eq!(m.futures_venue("ABCUSDT"), None);
        assert_eq!(m.price_venue("ABCUSDT"), Some((Venue::Spot, "ABCUSDT")));
    }

    #[test]
    fn unlisted_has_no_venue() {
        let m = VenueMembership::default();
        assert!(!m.is_listed_anywhere());
        assert_eq!(m.price_venue("NOPEUSDT"), None);
    }
}
