use super::{MarketChartProvider, Provider, RangeAggregateProvider, range_aggregate};
use crate::error::ChartError;
use crate::storage_utils::AppConfig;
use reqwest::Client;

/// Picks the provider for an instrument by its namespace prefix.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    routes: Vec<(String, Provider)>,
    fallback: Option<Provider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard setup: `X:` symbols go to Polygon, everything else to
    /// CoinGecko. Both share one connection pool.
    ///
    /// The client has no request timeout of its own. `StonksChart` bounds
    /// each whole fetch with `chart.fetch_timeout_secs` instead.
    pub fn from_config(config: &AppConfig, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder().pool_max_idle_per_host(10).build()?;

        let range_aggregate =
            RangeAggregateProvider::new(client.clone(), config.range_aggregate.clone(), api_key);
        let market_chart = MarketChartProvider::new(client, config.market_chart.clone());

        Ok(Self::new()
            .route(range_aggregate::PREFIX, Provider::RangeAggregate(range_aggregate))
            .fallback(Provider::MarketChart(market_chart)))
    }

    /// Sends identifiers starting with `prefix` to `provider`. Earlier
    /// routes win when prefixes overlap.
    pub fn route(mut self, prefix: impl Into<String>, provider: Provider) -> Self {
        self.routes.push((prefix.into(), provider));
        self
    }

    pub fn fallback(mut self, provider: Provider) -> Self {
        self.fallback = Some(provider);
        self
    }

    pub fn resolve(&self, instrument: &str) -> Result<&Provider, ChartError> {
        self.routes
            .iter()
            .find(|(prefix, _)| instrument.starts_with(prefix.as_str()))
            .map(|(_, provider)| provider)
            .or(self.fallback.as_ref())
            .ok_or_else(|| ChartError::UnroutableInstrument(instrument.to_string()))
    }
}
