//! CoinGecko `/coins/{id}/market_chart`. Broad crypto coverage, no key.

use super::http::{deserialize_epoch_ms, deserialize_f64_lenient, get_json};
use crate::error::FetchError;
use crate::history::{HistoryRange, HistorySeries, ProviderRequest};
use crate::storage_utils::MarketChartConfig;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

const NAME: &str = "coingecko";

#[derive(Deserialize, Debug)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Option<Vec<MarketChartPoint>>,
}

/// `[timestamp_ms, price]`
#[derive(Deserialize, Debug)]
struct MarketChartPoint(
    #[serde(deserialize_with = "deserialize_epoch_ms")] i64,
    #[serde(deserialize_with = "deserialize_f64_lenient")] f64,
);

#[derive(Debug, Clone)]
pub struct MarketChartProvider {
    client: Client,
    config: MarketChartConfig,
    coin_id_re: Regex,
}

impl MarketChartProvider {
    pub fn new(client: Client, config: MarketChartConfig) -> Self {
        Self {
            client,
            config,
            coin_id_re: Regex::new(r"^[a-z0-9][a-z0-9\-]*$").unwrap(),
        }
    }

    pub fn name(&self) -> &'static str {
        NAME
    }

    /// Maps a ticker like `BTC` to the coin id CoinGecko expects
    /// (`bitcoin`). Unknown tickers are lowercased and passed through.
    pub fn coin_id(&self, instrument: &str) -> Result<String, FetchError> {
        let ticker = instrument.trim();
        let ticker = ticker.strip_prefix("X:").unwrap_or(ticker);

        let coin_id = self
            .config
            .coin_ids
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(ticker))
            .map(|(_, id)| id.clone())
            .unwrap_or_else(|| ticker.to_lowercase());

        if !self.coin_id_re.is_match(&coin_id) {
            return Err(FetchError::InvalidInstrument {
                instrument: instrument.to_string(),
                reason: "CoinGecko ids are lower-case letters, digits and '-'".to_string(),
            });
        }
        Ok(coin_id)
    }

    pub async fn fetch_history(&self, request: &ProviderRequest) -> Result<HistorySeries, FetchError> {
        let coin_id = self.coin_id(&request.instrument)?;

        // Upstream picks the granularity: 5m up to a day, hourly up to 90
        // days, daily beyond.
        let days = match request.range {
            HistoryRange::Days(days) => days.to_string(),
            HistoryRange::Max => "max".to_string(),
        };

        tracing::info!(instrument = %request.instrument, %coin_id, %days, "fetching from CoinGecko");

        let url = format!(
            "{}/coins/{}/market_chart",
            self.config.base_url.trim_end_matches('/'),
            coin_id
        );
        let query = [
            ("vs_currency", self.config.vs_currency.clone()),
            ("days", days),
        ];

        let body: MarketChartResponse =
            get_json(&self.client, NAME, &request.instrument, &url, &query).await?;

        let points = body.prices.unwrap_or_default();
        if points.is_empty() {
            return Err(FetchError::NoData {
                instrument: request.instrument.clone(),
            });
        }
        tracing::info!(instrument = %request.instrument, points = points.len(), "fetched CoinGecko prices");

        let points = points.into_iter().map(|MarketChartPoint(ts, p)| (ts, p)).collect();
        HistorySeries::from_points(request.instrument.clone(), points).map_err(|e| {
            FetchError::MalformedResponse {
                provider: NAME,
                reason: e.to_string(),
            }
        })
    }
}
