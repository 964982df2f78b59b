use crate::error::ChartError;
use crate::history::HistorySeries;

/// Highest value the y-axis floor may take, so near-flat comparisons are not
/// zoomed in too far.
pub const Y_FLOOR_CEILING: f64 = 0.9;

/// Divides every price by the series' own maximum, mapping it onto (0, 1].
pub fn normalize(series: &HistorySeries) -> Result<HistorySeries, ChartError> {
    let max = series.max_price();
    if max <= 0.0 {
        return Err(ChartError::DegenerateSeries {
            instrument: series.instrument().to_string(),
        });
    }

    let scaled = series.prices().iter().map(|p| p / max).collect();
    // Dividing finite non-negative values by a positive max cannot break the
    // series invariants.
    series
        .with_prices(scaled)
        .map_err(|_| ChartError::DegenerateSeries {
            instrument: series.instrument().to_string(),
        })
}

/// Smallest normalized value across `series`, capped at [`Y_FLOOR_CEILING`].
pub fn y_floor(series: &[HistorySeries]) -> f64 {
    series
        .iter()
        .flat_map(|s| s.prices().iter().copied())
        .fold(1.0, f64::min)
        .min(Y_FLOOR_CEILING)
}
