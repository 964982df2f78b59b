//! Rendering collaborators. Each turns an [`AlignedDataset`] into bytes that
//! can be printed or saved; none of them feed anything back to the core.

use crate::chart::AlignedDataset;
use crate::history::HistoryRange;
use anyhow::Result;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color as TableColor, ContentArrangement, Table,
    modifiers::UTF8_ROUND_CORNERS, presets::UTF8_BORDERS_ONLY,
};
use ratatui::{
    Terminal,
    backend::TestBackend,
    prelude::*,
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
};

pub trait Renderer {
    /// File extension for saved output.
    fn extension(&self) -> &'static str;

    fn render(&self, dataset: &AlignedDataset) -> Result<Vec<u8>>;
}

pub fn chart_title(range: HistoryRange) -> String {
    match range {
        HistoryRange::Days(days) if days.get() == 1 => "Last day asset price comparison".to_string(),
        HistoryRange::Days(days) => format!("{days} days asset price comparison"),
        HistoryRange::Max => "Full history asset price comparison".to_string(),
    }
}

/// Value of `series` at or just before `ts`, if the series has started.
fn value_at(timestamps: &[i64], values: &[f64], ts: i64) -> Option<f64> {
    match timestamps.partition_point(|&t| t <= ts) {
        0 => None,
        n => Some(values[n - 1]),
    }
}

// --- Table ---

/// One row per tick: date, then each instrument's normalized price in %.
pub struct TableRenderer;

impl Renderer for TableRenderer {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn render(&self, dataset: &AlignedDataset) -> Result<Vec<u8>> {
        let mut header = vec![Cell::new("Time (UTC)").add_attribute(Attribute::Bold)];
        header.extend(dataset.instruments().map(|name| {
            Cell::new(name)
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right)
        }));

        let mut table = Table::new();
        table
            .load_preset(UTF8_BORDERS_ONLY)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(header);

        for (ts, label) in dataset.ticks() {
            let mut row = vec![Cell::new(label).fg(TableColor::DarkGrey)];
            for series in dataset.all_series() {
                let cell = match value_at(series.timestamps(), series.prices(), ts) {
                    Some(v) => {
                        // Dimmer the further below its own peak.
                        let shade = (255.0 * (0.4 + 0.6 * v)) as u8;
                        Cell::new(format!("{:.1}%", v * 100.0)).fg(TableColor::Rgb {
                            r: 0,
                            g: shade,
                            b: shade,
                        })
                    }
                    None => Cell::new("-").fg(TableColor::DarkGrey),
                };
                row.push(cell.set_alignment(CellAlignment::Right));
            }
            table.add_row(row);
        }

        let mut out = format!("{}\n{}\n", chart_title(dataset.range()), table);
        if let Some(first) = dataset.all_series().first() {
            let prices: Vec<String> = dataset
                .price_labels()
                .iter()
                .map(|l| format!("{:.2}", l.price))
                .collect();
            out.push_str(&format!("{} prices: {}\n", first.instrument(), prices.join(", ")));
        }
        Ok(out.into_bytes())
    }
}

// --- Line chart ---

const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
    Color::Green,
    Color::LightRed,
    Color::LightBlue,
];

/// Line chart drawn off-screen with ratatui, returned as plain text rows.
pub struct ChartRenderer {
    pub width: u16,
    pub height: u16,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self {
            width: 120,
            height: 32,
        }
    }
}

impl Renderer for ChartRenderer {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn render(&self, dataset: &AlignedDataset) -> Result<Vec<u8>> {
        let points: Vec<Vec<(f64, f64)>> = dataset
            .all_series()
            .iter()
            .map(|s| {
                s.timestamps()
                    .iter()
                    .zip(s.prices())
                    .map(|(&ts, &p)| (ts as f64, p))
                    .collect()
            })
            .collect();

        let datasets: Vec<Dataset> = dataset
            .all_series()
            .iter()
            .zip(&points)
            .enumerate()
            .map(|(i, (s, data))| {
                Dataset::default()
                    .name(s.instrument().to_string())
                    .marker(symbols::Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(PALETTE[i % PALETTE.len()]))
                    .data(data)
            })
            .collect();

        // First, middle and last tick keep the axis legible at any width.
        let ticks: Vec<&str> = dataset.ticks().map(|(_, label)| label).collect();
        let x_labels: Vec<Span> = match ticks.as_slice() {
            [] => Vec::new(),
            [only] => vec![Span::raw(only.to_string())],
            [first, .., last] => vec![
                Span::raw(first.to_string()),
                Span::raw(ticks[ticks.len() / 2].to_string()),
                Span::raw(last.to_string()),
            ],
        };

        let y_min = dataset.y_floor() - 0.05;
        let y_labels = vec![
            Span::raw(format!("{:.0}", y_min.max(0.0) * 100.0)),
            Span::raw(format!("{:.0}", (y_min.max(0.0) + 1.0) * 50.0)),
            Span::raw("100"),
        ];

        let (x_min, x_max) = dataset.bounds();
        let chart = Chart::new(datasets)
            .block(
                Block::default()
                    .title(chart_title(dataset.range()))
                    .borders(Borders::ALL),
            )
            .x_axis(
                Axis::default()
                    .title("Time")
                    .bounds([x_min as f64, x_max as f64])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .title("Normalized Price (%)")
                    .bounds([y_min, 1.05])
                    .labels(y_labels),
            );

        let mut terminal = Terminal::new(TestBackend::new(self.width, self.height))?;
        terminal.draw(|f| {
            let area = f.size();
            f.render_widget(chart, area);
        })?;

        let buffer = terminal.backend().buffer();
        let mut out = String::with_capacity(usize::from(self.width + 1) * usize::from(self.height));
        for y in 0..self.height {
            let line: String = (0..self.width).map(|x| buffer.get(x, y).symbol()).collect();
            out.push_str(line.trim_end());
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}

// --- JSON ---

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, dataset: &AlignedDataset) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(dataset)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistorySeries;

    fn dataset() -> AlignedDataset {
        let day = crate::history::MS_PER_DAY;
        let raw = vec![
            HistorySeries::new("BTC", vec![0, day, 2 * day], vec![10.0, 20.0, 5.0]).unwrap(),
            HistorySeries::new("ETH", vec![day, 2 * day], vec![3.0, 4.0]).unwrap(),
        ];
        let range = HistoryRange::days(3).unwrap();
        AlignedDataset::build(range, raw, 11).unwrap().0
    }

    #[test]
    fn titles_follow_the_range() {
        assert_eq!(chart_title(HistoryRange::days(1).unwrap()), "Last day asset price comparison");
        assert_eq!(chart_title(HistoryRange::days(365).unwrap()), "365 days asset price comparison");
        assert_eq!(chart_title(HistoryRange::Max), "Full history asset price comparison");
    }

    #[test]
    fn values_are_looked_up_at_or_before_a_tick() {
        let ts = [10, 20, 30];
        let vs = [1.0, 2.0, 3.0];
        assert_eq!(value_at(&ts, &vs, 5), None);
        assert_eq!(value_at(&ts, &vs, 20), Some(2.0));
        assert_eq!(value_at(&ts, &vs, 25), Some(2.0));
        assert_eq!(value_at(&ts, &vs, 99), Some(3.0));
    }

    #[test]
    fn table_has_a_row_per_tick_and_marks_missing_values() {
        let text = String::from_utf8(TableRenderer.render(&dataset()).unwrap()).unwrap();
        assert!(text.starts_with("3 days asset price comparison"));
        assert!(text.contains("1970-01-01 00:00 UTC"));
        assert!(text.contains("1970-01-03 00:00 UTC"));
        assert!(text.contains("50.0%"));
        assert!(text.contains("75.0%"));
        assert!(text.contains('-'));
        assert!(text.contains("BTC prices: 10.00, 20.00, 5.00"));
    }

    #[test]
    fn chart_fills_the_requested_canvas() {
        let renderer = ChartRenderer {
            width: 80,
            height: 20,
        };
        let text = String::from_utf8(renderer.render(&dataset()).unwrap()).unwrap();
        assert_eq!(text.lines().count(), 20);
        assert!(text.contains("3 days asset price comparison"));
    }

    #[test]
    fn json_exposes_the_dataset_shape() {
        let bytes = JsonRenderer.render(&dataset()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["reference_instrument"], "BTC");
        assert_eq!(value["tick_indices"], serde_json::json!([0, 1, 2]));
        assert_eq!(value["series"][1]["instrument"], "ETH");
    }
}
