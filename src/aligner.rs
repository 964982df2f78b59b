//! Picks the reference timeline for a comparison.
//!
//! The x-axis has to reach back as far as the longest-lived instrument, so
//! the series that starts earliest becomes the reference. Nothing is
//! resampled: every series keeps its own timestamps and only the reference
//! drives tick placement.

use crate::error::ChartError;
use crate::history::HistorySeries;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment<'a> {
    /// Position of the reference within the input slice.
    pub index: usize,
    pub reference: &'a HistorySeries,
    /// First and last timestamp of the reference.
    pub bounds: (i64, i64),
}

/// Returns the series with the earliest first timestamp. On ties the one
/// that comes first in `series` wins.
pub fn align(series: &[HistorySeries]) -> Result<Alignment<'_>, ChartError> {
    // min_by_key keeps the last minimum; scan manually so the first one wins.
    let mut best: Option<(usize, &HistorySeries)> = None;
    for (index, candidate) in series.iter().enumerate() {
        match best {
            Some((_, current)) if candidate.first_timestamp() >= current.first_timestamp() => {}
            _ => best = Some((index, candidate)),
        }
    }

    let (index, reference) = best.ok_or(ChartError::EmptyInput)?;
    Ok(Alignment {
        index,
        reference,
        bounds: (reference.first_timestamp(), reference.last_timestamp()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, timestamps: &[i64]) -> HistorySeries {
        let prices = vec![1.0; timestamps.len()];
        HistorySeries::new(name, timestamps.to_vec(), prices).unwrap()
    }

    #[test]
    fn oldest_start_becomes_the_reference() {
        let input = vec![
            series("A", &[100, 150, 300]),
            series("B", &[50, 60, 70]),
            series("C", &[200, 400]),
        ];
        let alignment = align(&input).unwrap();
        assert_eq!(alignment.index, 1);
        assert_eq!(alignment.reference.instrument(), "B");
        assert_eq!(alignment.bounds, (50, 70));
    }

    #[test]
    fn ties_go_to_the_first_occurrence() {
        let input = vec![
            series("A", &[10, 20]),
            series("B", &[5, 6]),
            series("C", &[5, 600]),
        ];
        assert_eq!(align(&input).unwrap().reference.instrument(), "B");
    }

    #[test]
    fn single_series_is_its_own_reference() {
        let input = vec![series("ONLY", &[7, 8, 9])];
        let alignment = align(&input).unwrap();
        assert_eq!(alignment.index, 0);
        assert_eq!(alignment.bounds, (7, 9));
    }

    #[test]
    fn reference_start_is_a_lower_bound_and_stable() {
        let input = vec![
            series("A", &[300, 301]),
            series("B", &[-20, 0, 20]),
            series("C", &[-20, 500]),
            series("D", &[0, 1]),
        ];
        let first = align(&input).unwrap();
        for s in &input {
            assert!(first.reference.first_timestamp() <= s.first_timestamp());
        }
        assert_eq!(align(&input).unwrap(), first);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(align(&[]).unwrap_err(), ChartError::EmptyInput);
    }
}
