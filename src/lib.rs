//! Fetches price histories from several upstream APIs, normalizes them onto
//! one relative scale and lays them out on the timeline of the oldest series,
//! ready for a renderer.

pub mod aligner;
pub mod chart;
pub mod command;
pub mod error;
pub mod history;
pub mod normalizer;
pub mod providers;
pub mod render;
pub mod storage_utils;
pub mod tick_sampler;

pub use chart::{AlignedDataset, ChartOutcome, ChartRequest, FetchWarning, StonksChart};
pub use error::{ChartError, FetchError, SeriesError};
pub use history::{HistoryRange, HistorySeries, ProviderRequest};
pub use providers::{Provider, ProviderRegistry};
