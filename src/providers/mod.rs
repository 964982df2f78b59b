//! Upstream price-history APIs behind one `fetch_history` capability.

mod http;
pub mod market_chart;
pub mod range_aggregate;
pub mod registry;

pub use market_chart::MarketChartProvider;
pub use range_aggregate::RangeAggregateProvider;
pub use registry::ProviderRegistry;

use crate::error::FetchError;
use crate::history::{HistorySeries, ProviderRequest};

/// One variant per upstream response shape.
#[derive(Debug, Clone)]
pub enum Provider {
    RangeAggregate(RangeAggregateProvider),
    MarketChart(MarketChartProvider),
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RangeAggregate(p) => p.name(),
            Self::MarketChart(p) => p.name(),
        }
    }

    /// One request against the upstream, no retries.
    pub async fn fetch_history(&self, request: &ProviderRequest) -> Result<HistorySeries, FetchError> {
        match self {
            Self::RangeAggregate(p) => p.fetch_history(request).await,
            Self::MarketChart(p) => p.fetch_history(request).await,
        }
    }
}
