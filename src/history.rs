use crate::error::{ChartError, SeriesError};
use chrono::DateTime;
use serde::Serialize;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

// --- Requests ---

/// How far back a history request reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRange {
    Days(NonZeroU32),
    /// Everything the upstream has.
    Max,
}

impl HistoryRange {
    pub fn days(days: u32) -> Option<Self> {
        NonZeroU32::new(days).map(Self::Days)
    }

    /// Number of days this range covers, with `Max` resolved to `max_days`.
    pub fn resolve_days(self, max_days: u32) -> u32 {
        match self {
            Self::Days(days) => days.get(),
            Self::Max => max_days,
        }
    }
}

impl FromStr for HistoryRange {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("max") || trimmed.eq_ignore_ascii_case("maximum") {
            return Ok(Self::Max);
        }
        trimmed
            .parse::<u32>()
            .ok()
            .and_then(Self::days)
            .ok_or_else(|| ChartError::InvalidRange(s.to_string()))
    }
}

impl fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days(days) => write!(f, "{days}"),
            Self::Max => f.write_str("max"),
        }
    }
}

/// One instrument over one range. Created per command, dropped once the
/// dataset is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub instrument: String,
    pub range: HistoryRange,
}

impl ProviderRequest {
    pub fn new(instrument: impl Into<String>, range: HistoryRange) -> Self {
        Self {
            instrument: instrument.into(),
            range,
        }
    }
}

// --- Series ---

/// Parallel timestamps (epoch ms) and prices for one instrument.
///
/// Always non-empty, strictly increasing in time, with finite non-negative
/// prices. The fields are private so a constructed series cannot drift out of
/// those invariants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySeries {
    instrument: String,
    timestamps: Vec<i64>,
    prices: Vec<f64>,
}

impl HistorySeries {
    pub fn new(
        instrument: impl Into<String>,
        timestamps: Vec<i64>,
        prices: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        if timestamps.len() != prices.len() {
            return Err(SeriesError::LengthMismatch {
                timestamps: timestamps.len(),
                prices: prices.len(),
            });
        }
        if timestamps.is_empty() {
            return Err(SeriesError::Empty);
        }
        if let Some(index) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(SeriesError::NonIncreasingTimestamps { index: index + 1 });
        }
        if let Some((index, &value)) = prices
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p < 0.0)
        {
            return Err(SeriesError::InvalidPrice { index, value });
        }

        Ok(Self {
            instrument: instrument.into(),
            timestamps,
            prices,
        })
    }

    /// Builds a series from upstream points in any order. Points sharing a
    /// timestamp collapse into the one that came last.
    pub fn from_points(
        instrument: impl Into<String>,
        mut points: Vec<(i64, f64)>,
    ) -> Result<Self, SeriesError> {
        // Stable sort keeps arrival order among equal timestamps.
        points.sort_by_key(|&(ts, _)| ts);

        let mut timestamps: Vec<i64> = Vec::with_capacity(points.len());
        let mut prices: Vec<f64> = Vec::with_capacity(points.len());
        for (ts, price) in points {
            if timestamps.last() == Some(&ts) {
                if let Some(last) = prices.last_mut() {
                    *last = price;
                }
                continue;
            }
            timestamps.push(ts);
            prices.push(price);
        }

        Self::new(instrument, timestamps, prices)
    }

    /// Same instrument and timeline, different prices. Used by the
    /// normalizer; the new prices go through the usual validation.
    pub fn with_prices(&self, prices: Vec<f64>) -> Result<Self, SeriesError> {
        Self::new(self.instrument.clone(), self.timestamps.clone(), prices)
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Never true for a constructed series; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn first_timestamp(&self) -> i64 {
        self.timestamps[0]
    }

    pub fn last_timestamp(&self) -> i64 {
        self.timestamps[self.timestamps.len() - 1]
    }

    pub fn max_price(&self) -> f64 {
        self.prices.iter().copied().fold(0.0, f64::max)
    }
}

/// Formats epoch milliseconds as `YYYY-MM-DD HH:MM UTC`.
pub fn format_timestamp(ts_ms: i64) -> String {
    match DateTime::from_timestamp_millis(ts_ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => "Unknown Time".to_string(),
    }
}
