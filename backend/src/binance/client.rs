use std::time::Duration;

use async_trait::async_trait;
use market::transport::{
    InverseContract, MarketDataTransport, RawCandle, RawFundingRate, RawLiquidation,
    RawOpenInterest, RawOpenInterestHist, RawPremiumIndex, RawPrice, RawTicker, TransportError,
};
use market::{CandleInterval, Venue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use super::errors::BinanceError;
use super::types::{ExchangeInfo, OneOrMany, decode_klines};

const OPEN_INTEREST_HIST_PATH: &str = "/futures/data/openInterestHist";

/// REST client for the three Binance venues.
#[derive(Clone)]
pub struct BinanceClient {
    http: Client,
    spot_url: String,
    linear_url: String,
    inverse_url: String,
}

impl BinanceClient {
    pub fn new(
        spot_url: String,
        linear_url: String,
        inverse_url: String,
        timeout: Duration,
    ) -> Result<Self, BinanceError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            spot_url,
            linear_url,
            inverse_url,
        })
    }

    /// Host plus API prefix for a venue.
    fn api(&self, venue: Venue) -> String {
        match venue {
            Venue::Spot => format!("{}/api/v3", self.spot_url),
            Venue::LinearFutures => format!("{}/fapi/v1", self.linear_url),
            Venue::InverseFutures => format!("{}/dapi/v1", self.inverse_url),
        }
    }

    fn futures_only(venue: Venue, capability: &'static str) -> Result<(), BinanceError> {
        if venue.is_futures() {
            Ok(())
        } else {
            Err(BinanceError::Unsupported { venue, capability })
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, BinanceError> {
        let resp = self.http.get(url).query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BinanceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl MarketDataTransport for BinanceClient {
    #[instrument(skip(self), level = "debug")]
    async fn probe_instrument(&self, venue: Venue, symbol: &str) -> Result<(), TransportError> {
        // Unknown symbols answer 400; the body is irrelevant.
        let url = format!("{}/ticker/price", self.api(venue));
        self.get::<Value>(&url, &[("symbol", symbol.to_string())])
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn inverse_catalog(&self) -> Result<Vec<InverseContract>, TransportError> {
        let url = format!("{}/exchangeInfo", self.api(Venue::InverseFutures));
        let info: ExchangeInfo = self.get(&url, &[]).await?;

        debug!(contracts = info.symbols.len(), "inverse catalog fetched");
        Ok(info.symbols)
    }

    #[instrument(skip(self), level = "debug")]
    async fn last_price(&self, venue: Venue, symbol: &str) -> Result<RawPrice, TransportError> {
        let url = format!("{}/ticker/price", self.api(venue));
        let price: OneOrMany<RawPrice> = self.get(&url, &[("symbol", symbol.to_string())]).await?;
        Ok(price.into_first()?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn candles(
        &self,
        venue: Venue,
        symbol: &str,
        interval: CandleInterval,
        limit: usize,
    ) -> Result<Vec<RawCandle>, TransportError> {
        let url = format!("{}/klines", self.api(venue));
        let rows: Vec<Vec<Value>> = self
            .get(
                &url,
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        Ok(decode_klines(venue, rows)?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn spot_ticker(&self, symbol: &str) -> Result<RawTicker, TransportError> {
        let url = format!("{}/ticker/24hr", self.api(Venue::Spot));
        Ok(self.get(&url, &[("symbol", symbol.to_string())]).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn premium_index(
        &self,
        venue: Venue,
        symbol: &str,
    ) -> Result<RawPremiumIndex, TransportError> {
        Self::futures_only(venue, "premium_index")?;
        let url = format!("{}/premiumIndex", self.api(venue));
        let index: OneOrMany<RawPremiumIndex> =
            self.get(&url, &[("symbol", symbol.to_string())]).await?;
        Ok(index.into_first()?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn funding_history(
        &self,
        venue: Venue,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<RawFundingRate>, TransportError> {
        Self::futures_only(venue, "funding_history")?;
        let url = format!("{}/fundingRate", self.api(venue));
        Ok(self
            .get(
                &url,
                &[("symbol", symbol.to_string()), ("limit", limit.to_string())],
            )
            .await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn open_interest(
        &self,
        venue: Venue,
        symbol: &str,
    ) -> Result<RawOpenInterest, TransportError> {
        Self::futures_only(venue, "open_interest")?;
        let url = format!("{}/openInterest", self.api(venue));
        Ok(self.get(&url, &[("symbol", symbol.to_string())]).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn open_interest_history(
        &self,
        venue: Venue,
        symbol: &str,
        period: CandleInterval,
        limit: usize,
    ) -> Result<Vec<RawOpenInterestHist>, TransportError> {
        let mut query = vec![
            ("period", period.as_str().to_string()),
            ("limit", limit.to_string()),
        ];

        let base = match venue {
            Venue::LinearFutures => {
                query.push(("symbol", symbol.to_string()));
                &self.linear_url
            }
            Venue::InverseFutures => {
                // Statistics are keyed by pair, e.g. BTCUSD for BTCUSD_PERP.
                let pair = symbol.split('_').next().unwrap_or(symbol);
                query.push(("pair", pair.to_string()));
                query.push(("contractType", "PERPETUAL".to_string()));
                &self.inverse_url
            }
            Venue::Spot => {
                return Err(BinanceError::Unsupported {
                    venue,
                    capability: "open_interest_history",
                }
                .into());
            }
        };

        let url = format!("{base}{OPEN_INTEREST_HIST_PATH}");
        Ok(self.get(&url, &query).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn liquidations(
        &self,
        venue: Venue,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<RawLiquidation>, TransportError> {
        Self::futures_only(venue, "liquidations")?;
        let url = format!("{}/allForceOrders", self.api(venue));
        Ok(self
            .get(
                &url,
                &[("symbol", symbol.to_string()), ("limit", limit.to_string())],
            )
            .await?)
    }
}
