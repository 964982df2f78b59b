//! Turns a chart request into an [`AlignedDataset`]: fetch every instrument,
//! normalize, align on the oldest series and pick tick positions.

use crate::aligner;
use crate::error::{ChartError, FetchError};
use crate::history::{HistoryRange, HistorySeries, ProviderRequest, format_timestamp};
use crate::normalizer;
use crate::providers::ProviderRegistry;
use crate::storage_utils::ChartConfig;
use crate::tick_sampler;
use serde::Serialize;
use std::time::Duration;

/// What the user asked for: one range, one or more instruments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub range: HistoryRange,
    pub instruments: Vec<String>,
}

/// An instrument left out of the chart, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchWarning {
    pub instrument: String,
    pub reason: String,
}

/// Absolute price shown next to a tick of the first series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceLabel {
    pub timestamp: i64,
    pub normalized: f64,
    pub price: f64,
}

/// Everything a renderer needs. Built once per request, never mutated, so
/// the fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedDataset {
    range: HistoryRange,
    /// Normalized series in request order.
    series: Vec<HistorySeries>,
    reference_instrument: String,
    reference_timeline: Vec<i64>,
    reference_labels: Vec<String>,
    /// Positions into `reference_timeline`.
    tick_indices: Vec<usize>,
    bounds: (i64, i64),
    y_floor: f64,
    price_labels: Vec<PriceLabel>,
}

impl AlignedDataset {
    pub fn range(&self) -> HistoryRange {
        self.range
    }

    pub fn all_series(&self) -> &[HistorySeries] {
        &self.series
    }

    pub fn series(&self, instrument: &str) -> Option<&HistorySeries> {
        self.series.iter().find(|s| s.instrument() == instrument)
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.instrument())
    }

    pub fn reference_instrument(&self) -> &str {
        &self.reference_instrument
    }

    pub fn reference_timeline(&self) -> &[i64] {
        &self.reference_timeline
    }

    pub fn reference_labels(&self) -> &[String] {
        &self.reference_labels
    }

    pub fn tick_indices(&self) -> &[usize] {
        &self.tick_indices
    }

    /// First and last timestamp of the reference series.
    pub fn bounds(&self) -> (i64, i64) {
        self.bounds
    }

    pub fn y_floor(&self) -> f64 {
        self.y_floor
    }

    pub fn price_labels(&self) -> &[PriceLabel] {
        &self.price_labels
    }

    /// `(timestamp, label)` for every tick.
    pub fn ticks(&self) -> impl Iterator<Item = (i64, &str)> {
        self.tick_indices
            .iter()
            .map(|&i| (self.reference_timeline[i], self.reference_labels[i].as_str()))
    }

    /// Builds the dataset from series that were already fetched.
    ///
    /// Degenerate series are dropped and reported in the returned warnings.
    /// Fails with `NoUsableData` when nothing is left and with `EmptyInput`
    /// only if `raw` is empty.
    pub fn build(
        range: HistoryRange,
        raw: Vec<HistorySeries>,
        tick_count: usize,
    ) -> Result<(Self, Vec<FetchWarning>), ChartError> {
        if raw.is_empty() {
            return Err(ChartError::EmptyInput);
        }

        let mut warnings = Vec::new();
        let mut kept_raw = Vec::with_capacity(raw.len());
        let mut normalized = Vec::with_capacity(raw.len());
        for series in raw {
            match normalizer::normalize(&series) {
                Ok(n) => {
                    normalized.push(n);
                    kept_raw.push(series);
                }
                Err(e) => {
                    tracing::warn!(instrument = series.instrument(), error = %e, "skipping series");
                    warnings.push(FetchWarning {
                        instrument: series.instrument().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if normalized.is_empty() {
            return Err(ChartError::NoUsableData {
                failures: warnings
                    .into_iter()
                    .map(|w| (w.instrument, w.reason))
                    .collect(),
            });
        }

        let alignment = aligner::align(&normalized)?;
        let reference = alignment.reference;
        let reference_timeline = reference.timestamps().to_vec();
        let reference_labels = reference_timeline
            .iter()
            .map(|&ts| format_timestamp(ts))
            .collect();
        let tick_indices = tick_sampler::sample_ticks(reference_timeline.len(), tick_count);

        // Real prices along the first series, at its own tick positions.
        let (first_raw, first_norm) = (&kept_raw[0], &normalized[0]);
        let price_labels = tick_sampler::sample_ticks(first_raw.len(), tick_count)
            .into_iter()
            .map(|i| PriceLabel {
                timestamp: first_raw.timestamps()[i],
                normalized: first_norm.prices()[i],
                price: first_raw.prices()[i],
            })
            .collect();

        let dataset = Self {
            range,
            reference_instrument: reference.instrument().to_string(),
            bounds: alignment.bounds,
            y_floor: normalizer::y_floor(&normalized),
            reference_timeline,
            reference_labels,
            tick_indices,
            price_labels,
            series: normalized,
        };
        Ok((dataset, warnings))
    }
}

/// A dataset plus the instruments that did not make it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOutcome {
    pub dataset: AlignedDataset,
    pub warnings: Vec<FetchWarning>,
}

/// Owns the providers and chart settings for the lifetime of the process.
/// Pass it to whatever needs to build charts.
pub struct StonksChart {
    registry: ProviderRegistry,
    settings: ChartConfig,
}

impl StonksChart {
    pub fn new(registry: ProviderRegistry, settings: ChartConfig) -> Self {
        Self { registry, settings }
    }

    pub fn settings(&self) -> &ChartConfig {
        &self.settings
    }

    /// Fetches one instrument. The whole fetch, body included, is bounded by
    /// `fetch_timeout_secs`; the HTTP client itself carries no timeout.
    async fn fetch_one(&self, request: ProviderRequest) -> (String, Result<HistorySeries, String>) {
        let provider = match self.registry.resolve(&request.instrument) {
            Ok(provider) => provider,
            Err(e) => return (request.instrument, Err(e.to_string())),
        };

        let timeout = Duration::from_secs(self.settings.fetch_timeout_secs);
        let result = match tokio::time::timeout(timeout, provider.fetch_history(&request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::UpstreamUnavailable {
                provider: provider.name(),
                reason: format!("no response within {}s", timeout.as_secs()),
            }),
        };

        (request.instrument, result.map_err(|e| e.to_string()))
    }

    /// Fetches everything, then decides. A failed instrument only drops
    /// itself; the request fails only when no series survives.
    pub async fn build(&self, request: &ChartRequest) -> Result<ChartOutcome, ChartError> {
        let batch_size = self.settings.max_concurrent_fetches.max(1);

        let mut fetched = Vec::with_capacity(request.instruments.len());
        let mut warnings = Vec::new();

        for batch in request.instruments.chunks(batch_size) {
            let tasks: Vec<_> = batch
                .iter()
                .map(|instrument| self.fetch_one(ProviderRequest::new(instrument.clone(), request.range)))
                .collect();

            for (instrument, result) in futures::future::join_all(tasks).await {
                match result {
                    Ok(series) => fetched.push(series),
                    Err(reason) => {
                        tracing::warn!(%instrument, %reason, "error fetching data");
                        warnings.push(FetchWarning { instrument, reason });
                    }
                }
            }
        }

        if fetched.is_empty() {
            return Err(ChartError::NoUsableData {
                failures: warnings
                    .into_iter()
                    .map(|w| (w.instrument, w.reason))
                    .collect(),
            });
        }

        let (dataset, skipped) =
            AlignedDataset::build(request.range, fetched, self.settings.tick_count).map_err(
                |e| match e {
                    // Fold fetch failures into the terminal error as well.
                    ChartError::NoUsableData { failures } => ChartError::NoUsableData {
                        failures: warnings
                            .iter()
                            .map(|w| (w.instrument.clone(), w.reason.clone()))
                            .chain(failures)
                            .collect(),
                    },
                    other => other,
                },
            )?;
        warnings.extend(skipped);

        tracing::info!(
            instruments = dataset.series.len(),
            reference = %dataset.reference_instrument,
            skipped = warnings.len(),
            "chart data ready"
        );
        Ok(ChartOutcome { dataset, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, timestamps: &[i64], prices: &[f64]) -> HistorySeries {
        HistorySeries::new(name, timestamps.to_vec(), prices.to_vec()).unwrap()
    }

    fn days(n: u32) -> HistoryRange {
        HistoryRange::days(n).unwrap()
    }

    #[test]
    fn dataset_follows_the_oldest_series() {
        let raw = vec![
            series("A", &[100, 200, 300], &[10.0, 20.0, 5.0]),
            series("B", &[50, 150, 250, 350], &[1.0, 2.0, 4.0, 2.0]),
            series("C", &[200, 300], &[3.0, 3.0]),
        ];
        let (dataset, warnings) = AlignedDataset::build(days(30), raw, 11).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(dataset.reference_instrument, "B");
        assert_eq!(dataset.reference_timeline, vec![50, 150, 250, 350]);
        assert_eq!(dataset.bounds, (50, 350));
        assert_eq!(dataset.reference_labels.len(), 4);
        assert_eq!(dataset.tick_indices, vec![0, 1, 2, 3]);
        assert_eq!(dataset.series("A").unwrap().prices(), &[0.5, 1.0, 0.25]);
        assert_eq!(dataset.series("C").unwrap().prices(), &[1.0, 1.0]);
        assert_eq!(dataset.y_floor, 0.25);
        assert_eq!(dataset.instruments().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn price_labels_carry_real_prices_of_the_first_series() {
        let raw = vec![series("A", &[1, 2, 3], &[10.0, 20.0, 5.0])];
        let (dataset, _) = AlignedDataset::build(days(1), raw, 2).unwrap();

        assert_eq!(
            dataset.price_labels,
            vec![
                PriceLabel { timestamp: 1, normalized: 0.5, price: 10.0 },
                PriceLabel { timestamp: 3, normalized: 0.25, price: 5.0 },
            ]
        );
        assert_eq!(dataset.ticks().map(|(ts, _)| ts).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn accessors_expose_a_consistent_read_only_view() {
        let raw = vec![
            series("A", &[10, 20, 30, 40, 50], &[1.0, 2.0, 3.0, 4.0, 5.0]),
            series("B", &[30, 40], &[2.0, 1.0]),
        ];
        let (dataset, _) = AlignedDataset::build(days(5), raw, 3).unwrap();

        assert_eq!(dataset.range(), days(5));
        assert_eq!(dataset.all_series().len(), 2);
        assert_eq!(dataset.reference_instrument(), "A");
        assert_eq!(dataset.tick_indices(), &[0, 2, 4]);
        assert!(dataset.tick_indices().iter().all(|&i| i < dataset.reference_timeline().len()));
        assert_eq!(dataset.reference_labels().len(), dataset.reference_timeline().len());
        assert_eq!(dataset.bounds(), (10, 50));
        assert_eq!(dataset.y_floor(), 0.2);
        assert_eq!(dataset.price_labels().len(), 3);
        assert_eq!(dataset.ticks().map(|(ts, _)| ts).collect::<Vec<_>>(), vec![10, 30, 50]);
    }

    #[test]
    fn degenerate_series_are_skipped_with_a_warning() {
        let raw = vec![
            series("ZERO", &[1, 2], &[0.0, 0.0]),
            series("OK", &[5, 6], &[1.0, 2.0]),
        ];
        let (dataset, warnings) = AlignedDataset::build(days(7), raw, 11).unwrap();

        assert_eq!(dataset.series.len(), 1);
        assert_eq!(dataset.reference_instrument, "OK");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].instrument, "ZERO");
    }

    #[test]
    fn only_degenerate_series_is_no_usable_data() {
        let raw = vec![series("ZERO", &[1], &[0.0])];
        let err = AlignedDataset::build(days(7), raw, 11).unwrap_err();
        assert!(matches!(err, ChartError::NoUsableData { failures } if failures[0].0 == "ZERO"));
    }

    #[test]
    fn empty_input_is_a_contract_violation() {
        assert_eq!(
            AlignedDataset::build(days(7), Vec::new(), 11).unwrap_err(),
            ChartError::EmptyInput
        );
    }

    #[tokio::test]
    async fn unroutable_instruments_become_warnings() {
        let chart = StonksChart::new(ProviderRegistry::new(), ChartConfig::default());
        let request = ChartRequest {
            range: days(30),
            instruments: vec!["BTC".to_string()],
        };

        let err = chart.build(&request).await.unwrap_err();
        assert_eq!(
            err,
            ChartError::NoUsableData {
                failures: vec![(
                    "BTC".to_string(),
                    "no provider handles instrument 'BTC'".to_string()
                )]
            }
        );
    }
}
