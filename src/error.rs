//! Error types for fetching, building and validating price histories.

use thiserror::Error;

/// Per-instrument failures raised by a provider client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("{provider}: API key not found, set the {env_var} environment variable")]
    MissingCredentials {
        provider: &'static str,
        env_var: String,
    },

    #[error("invalid instrument '{instrument}': {reason}")]
    InvalidInstrument { instrument: String, reason: String },

    #[error("no data available for '{instrument}' in the requested period")]
    NoData { instrument: String },

    #[error("{provider}: rate limit exceeded, wait before making another request")]
    UpstreamRateLimited { provider: &'static str },

    #[error("{provider}: request failed: {reason}")]
    UpstreamUnavailable {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider}: malformed response: {reason}")]
    MalformedResponse {
        provider: &'static str,
        reason: String,
    },
}

/// Violations of the `HistorySeries` invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("series has no data points")]
    Empty,

    #[error("{timestamps} timestamps but {prices} prices")]
    LengthMismatch { timestamps: usize, prices: usize },

    #[error("timestamp at index {index} does not increase")]
    NonIncreasingTimestamps { index: usize },

    #[error("price at index {index} is {value}, expected a finite non-negative number")]
    InvalidPrice { index: usize, value: f64 },
}

/// Errors raised while turning requests into an aligned dataset.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    #[error("no provider handles instrument '{0}'")]
    UnroutableInstrument(String),

    /// Caller passed no series to the aligner.
    #[error("cannot align an empty list of series")]
    EmptyInput,

    #[error("every price of '{instrument}' is zero, it cannot be normalized")]
    DegenerateSeries { instrument: String },

    #[error("no data could be fetched for any ticker: {}", summarize(.failures))]
    NoUsableData { failures: Vec<(String, String)> },

    #[error("invalid range '{0}': use a positive number of days or 'max'")]
    InvalidRange(String),

    #[error("too many tickers specified ({count}), maximum allowed is {max}")]
    TooManyInstruments { count: usize, max: usize },

    #[error("unknown ticker category '{category}', choose one of: {known}")]
    UnknownTickerCategory { category: String, known: String },
}

fn summarize(failures: &[(String, String)]) -> String {
    if failures.is_empty() {
        return "nothing was requested".to_string();
    }
    failures
        .iter()
        .map(|(instrument, reason)| format!("{instrument} ({reason})"))
        .collect::<Vec<_>>()
        .join(", ")
}
