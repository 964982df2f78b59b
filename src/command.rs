use crate::chart::ChartRequest;
use crate::error::ChartError;
use crate::history::HistoryRange;
use crate::storage_utils::AppConfig;

/// Builds a validated request from a range argument and a ticker list,
/// filling in the configured defaults for whatever is missing. `category`
/// picks the default ticker set and is ignored when tickers are given.
pub fn parse_request(
    range: Option<&str>,
    instruments: &[String],
    category: Option<&str>,
    config: &AppConfig,
) -> Result<ChartRequest, ChartError> {
    let range: HistoryRange = range.unwrap_or(config.default_range.as_str()).parse()?;

    if let HistoryRange::Days(days) = range {
        let rules = &config.validation;
        if days.get() < rules.min_days || days.get() > rules.max_days {
            return Err(ChartError::InvalidRange(format!(
                "{days} (allowed {}..={} days)",
                rules.min_days, rules.max_days
            )));
        }
    }

    let source = if instruments.is_empty() {
        config.default_tickers_for(category).ok_or_else(|| ChartError::UnknownTickerCategory {
            category: category.unwrap_or(config.default_category.as_str()).to_string(),
            known: config.ticker_categories().collect::<Vec<_>>().join(", "),
        })?
    } else {
        instruments
    };

    // Same ticker twice would collide in the legend; keep the first.
    let mut unique: Vec<String> = Vec::with_capacity(source.len());
    for instrument in source.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !unique.iter().any(|u| u == instrument) {
            unique.push(instrument.to_string());
        }
    }

    let max = config.validation.max_tickers;
    if unique.len() > max {
        return Err(ChartError::TooManyInstruments {
            count: unique.len(),
            max,
        });
    }

    Ok(ChartRequest {
        range,
        instruments: unique,
    })
}

/// `stonks_30_X-GOOG_BTC.txt` style name for a saved chart. Only
/// `[A-Za-z0-9._-]` survive, so the name never leaves the target directory.
pub fn output_file_name(args: &[String], extension: &str) -> String {
    let parts: Vec<String> = args.iter().map(|a| sanitize(a)).collect();
    let mut name = "stonks".to_string();
    if !parts.is_empty() {
        name.push('_');
        name.push_str(&parts.join("_"));
    }
    format!("{name}.{extension}")
}

fn sanitize(arg: &str) -> String {
    arg.chars()
        .map(|c| match c {
            ':' => '-',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => c,
            _ => '_',
        })
        .collect()
}
