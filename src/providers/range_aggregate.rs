//! Polygon.io aggregates: `/ticker/{symbol}/range/1/{interval}/{from}/{to}`.
//!
//! Serves stocks and some crypto pairs, addressed as `X:SYMBOL`
//! (`X:GOOG`, `X:BTCUSD`). Needs an API key.

use super::http::{deserialize_epoch_ms, deserialize_f64_lenient, get_json};
use crate::error::FetchError;
use crate::history::{HistoryRange, HistorySeries, MS_PER_DAY, ProviderRequest};
use crate::storage_utils::RangeAggregateConfig;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

pub const PREFIX: &str = "X:";
const NAME: &str = "polygon";
// Worst case for a 24/7 pair such as X:BTCUSD.
const MINUTE_BARS_PER_DAY: u64 = 1440;

#[derive(Deserialize, Debug)]
struct AggregatesResponse {
    #[serde(default)]
    results: Option<Vec<AggregateBar>>,
    /// Present when the upstream cut the result at `limit` rows.
    #[serde(default)]
    next_url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct AggregateBar {
    #[serde(rename = "t", deserialize_with = "deserialize_epoch_ms")]
    timestamp: i64,
    #[serde(rename = "c", deserialize_with = "deserialize_f64_lenient")]
    close: f64,
}

/// Bar size requested from the aggregates endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Minute,
    Day,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Day => "day",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RangeAggregateProvider {
    client: Client,
    config: RangeAggregateConfig,
    api_key: Option<String>,
    symbol_re: Regex,
}

impl RangeAggregateProvider {
    pub fn new(client: Client, config: RangeAggregateConfig, api_key: Option<String>) -> Self {
        Self {
            client,
            config,
            api_key,
            // Static pattern, cannot fail to compile.
            symbol_re: Regex::new(r"^[A-Z0-9.\-]+$").unwrap(),
        }
    }

    pub fn name(&self) -> &'static str {
        NAME
    }

    /// Minute bars for short ranges, day bars once the range is longer than
    /// `minute_interval_max_days` or its minute bars would not fit in `limit`.
    pub fn interval_for(&self, range: HistoryRange) -> Interval {
        match range {
            HistoryRange::Max => Interval::Day,
            HistoryRange::Days(days) => {
                let days = days.get();
                let minute_bars = u64::from(days) * MINUTE_BARS_PER_DAY;
                if days > self.config.minute_interval_max_days
                    || minute_bars > u64::from(self.config.limit)
                {
                    Interval::Day
                } else {
                    Interval::Minute
                }
            }
        }
    }

    /// Strips the namespace prefix and checks the remaining symbol.
    pub fn symbol_for<'a>(&self, instrument: &'a str) -> Result<&'a str, FetchError> {
        let invalid = |reason: &str| FetchError::InvalidInstrument {
            instrument: instrument.to_string(),
            reason: reason.to_string(),
        };

        let symbol = instrument
            .strip_prefix(PREFIX)
            .ok_or_else(|| invalid("use 'X:SYMBOL' for Polygon or 'symbol' for CoinGecko"))?;
        if !self.symbol_re.is_match(symbol) {
            return Err(invalid("Polygon symbols are upper-case letters, digits, '.' or '-'"));
        }
        Ok(symbol)
    }

    pub async fn fetch_history(&self, request: &ProviderRequest) -> Result<HistorySeries, FetchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FetchError::MissingCredentials {
                provider: NAME,
                env_var: self.config.api_key_env.clone(),
            })?;
        let symbol = self.symbol_for(&request.instrument)?;

        let days = request.range.resolve_days(self.config.max_history_days);
        let interval = self.interval_for(request.range);
        let end_ms = chrono::Utc::now().timestamp_millis();
        let start_ms = end_ms - i64::from(days) * MS_PER_DAY;

        tracing::info!(
            instrument = %request.instrument,
            days,
            interval = interval.as_str(),
            "fetching from Polygon"
        );

        let url = format!(
            "{}/ticker/{}/range/1/{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            symbol,
            interval.as_str(),
            start_ms,
            end_ms
        );
        let query = [
            ("limit", self.config.limit.to_string()),
            ("apiKey", api_key.to_string()),
        ];

        let body: AggregatesResponse =
            get_json(&self.client, NAME, &request.instrument, &url, &query).await?;

        let bars = body.results.unwrap_or_default();
        if bars.is_empty() {
            return Err(FetchError::NoData {
                instrument: request.instrument.clone(),
            });
        }
        if body.next_url.is_some() {
            // Only the oldest `limit` bars arrived; the chart ends early.
            tracing::warn!(
                instrument = %request.instrument,
                points = bars.len(),
                limit = self.config.limit,
                "Polygon result truncated at the row limit"
            );
        }
        tracing::info!(instrument = %request.instrument, points = bars.len(), "fetched Polygon bars");

        let points = bars.into_iter().map(|b| (b.timestamp, b.close)).collect();
        HistorySeries::from_points(request.instrument.clone(), points).map_err(|e| {
            FetchError::MalformedResponse {
                provider: NAME,
                reason: e.to_string(),
            }
        })
    }
}
