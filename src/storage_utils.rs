use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::fs;

// CONFIGURATION STRUCTS
// config.json deserializes straight into these. Every field has a default so a
// partial file (or no file at all) still yields a usable config.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ChartConfig {
    pub tick_count: usize,             // labelled positions on the time axis
    pub max_concurrent_fetches: usize, // fetches in flight at once
    pub fetch_timeout_secs: u64,       // per fetch, including the body
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            tick_count: 11,
            max_concurrent_fetches: 4,
            fetch_timeout_secs: 30,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub max_tickers: usize,
    pub min_days: u32,
    pub max_days: u32, // 10 years
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_tickers: 10,
            min_days: 1,
            max_days: 3650,
        }
    }
}

/// Polygon aggregates endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RangeAggregateConfig {
    pub base_url: String,
    pub api_key_env: String,
    /// Ranges up to this many days use minute bars, longer ones daily bars.
    pub minute_interval_max_days: u32,
    /// What "max" means for an API that needs an explicit start.
    pub max_history_days: u32,
    pub limit: u32,
}

impl Default for RangeAggregateConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.polygon.io/v2/aggs".to_string(),
            api_key_env: "POLYGON".to_string(),
            minute_interval_max_days: 60,
            max_history_days: 3650,
            limit: 50_000,
        }
    }
}

/// CoinGecko market-chart endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MarketChartConfig {
    pub base_url: String,
    pub vs_currency: String,
    pub coin_ids: HashMap<String, String>, // ticker -> coin id
}

impl Default for MarketChartConfig {
    fn default() -> Self {
        let coin_ids = [
            ("BTC", "bitcoin"),
            ("ETH", "ethereum"),
            ("XMR", "monero"),
            ("AVAX", "avalanche-2"),
            ("ADA", "cardano"),
            ("DOT", "polkadot"),
            ("LINK", "chainlink"),
            ("LTC", "litecoin"),
            ("BCH", "bitcoin-cash"),
            ("XRP", "ripple"),
            ("SOL", "solana"),
            ("MATIC", "matic-network"),
            ("UNI", "uniswap"),
            ("ATOM", "cosmos"),
            ("FTM", "fantom"),
        ]
        .into_iter()
        .map(|(ticker, id)| (ticker.to_string(), id.to_string()))
        .collect();

        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            vs_currency: "usd".to_string(),
            coin_ids,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub default_range: String,
    /// Ticker sets used when none are given, keyed by category.
    pub default_tickers: BTreeMap<String, Vec<String>>,
    pub default_category: String,
    // Nested structs organize the config logically
    pub chart: ChartConfig,
    pub validation: ValidationConfig,
    pub range_aggregate: RangeAggregateConfig,
    pub market_chart: MarketChartConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_range: "365".to_string(),
            default_tickers: BTreeMap::from([
                ("cryptocurrencies".to_string(), tickers(&["BTC", "ETH", "XMR", "AVAX"])),
                ("stocks".to_string(), tickers(&["X:GOOG", "X:NVDA", "X:AAPL", "X:MSFT"])),
                (
                    "mixed".to_string(),
                    tickers(&["X:BTCUSD", "X:ETHUSD", "X:XMRUSD", "X:AVAXUSD"]),
                ),
            ]),
            default_category: "cryptocurrencies".to_string(),
            chart: ChartConfig::default(),
            validation: ValidationConfig::default(),
            range_aggregate: RangeAggregateConfig::default(),
            market_chart: MarketChartConfig::default(),
        }
    }
}

fn tickers(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl AppConfig {
    /// Loads `config.json` from the storage directory, falling back to the
    /// built-in defaults when the file does not exist.
    pub async fn load_or_default(storage: &AsyncStorageManager) -> anyhow::Result<Self> {
        if !storage.exists("config").await {
            tracing::info!(dir = ?storage.base_dir, "no config.json found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = storage.load("config").await?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would load fine but break every chart.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chart.tick_count == 0 {
            anyhow::bail!("chart.tick_count must be at least 1");
        }
        if self.chart.fetch_timeout_secs == 0 {
            anyhow::bail!("chart.fetch_timeout_secs must be at least 1");
        }
        if self.chart.max_concurrent_fetches == 0 {
            anyhow::bail!("chart.max_concurrent_fetches must be at least 1");
        }
        if self.validation.min_days > self.validation.max_days {
            anyhow::bail!(
                "validation.min_days ({}) is above validation.max_days ({})",
                self.validation.min_days,
                self.validation.max_days
            );
        }
        if !self.default_tickers.contains_key(&self.default_category) {
            anyhow::bail!(
                "default_category '{}' is not a key of default_tickers",
                self.default_category
            );
        }
        Ok(())
    }

    /// The default ticker set for `category`, or for `default_category`
    /// when none is given. `None` for an unknown category.
    pub fn default_tickers_for(&self, category: Option<&str>) -> Option<&[String]> {
        let category = category.unwrap_or(self.default_category.as_str());
        self.default_tickers.get(category).map(Vec::as_slice)
    }

    pub fn ticker_categories(&self) -> impl Iterator<Item = &str> {
        self.default_tickers.keys().map(String::as_str)
    }

    /// Reads the range-aggregate API key from the environment. Blank values
    /// count as absent.
    pub fn range_aggregate_api_key(&self) -> Option<String> {
        std::env::var(&self.range_aggregate.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path to the storage directory (e.g., ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// **Constructor: new_relative**
    /// Creates a new manager instance. It calculates the storage path relative
    /// to where the binary executable is running.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        // 1. Locate the running executable
        let exe_path = std::env::current_exe()?;

        // 2. Resolve the parent directory and append the relative path (e.g., "storage")
        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::new(base_dir).await
    }

    /// **Constructor: new**
    /// Uses `base_dir` as given, creating it if needed.
    pub async fn new<P: Into<PathBuf>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();

        // Create the directory up front so save() never has to check.
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }

        Ok(Self { base_dir })
    }

    /// A manager for a subdirectory, e.g. `pics` for saved charts.
    pub async fn child(&self, name: &str) -> anyhow::Result<Self> {
        Self::new(self.base_dir.join(name)).await
    }

    pub async fn exists(&self, filename: &str) -> bool {
        fs::try_exists(self.base_dir.join(format!("{}.json", filename)))
            .await
            .unwrap_or(false)
    }

    /// **Raw Save Function**
    /// Writes `bytes` to `file_name` with an "Atomic Write": a .tmp file is
    /// written first and renamed over the target, so a crash mid-write never
    /// leaves a truncated file behind.
    pub async fn save_bytes(&self, file_name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
        let final_path = self.base_dir.join(file_name);
        let tmp_path = self.base_dir.join(format!("{}.tmp", file_name));

        // 1. Write data to the temporary file
        fs::write(&tmp_path, bytes).await?;

        // 2. Atomically rename the temp file to the final name.
        fs::rename(&tmp_path, &final_path).await?;

        Ok(final_path)
    }

    /// **Generic Load Function**
    /// Reads `<filename>.json` and deserializes it into `T`.
    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        let path = self.base_dir.join(format!("{}.json", filename));

        // Bytes rather than a String: serde_json validates UTF-8 itself.
        let content = fs::read(path).await?;

        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("stonks-storage-{}-{}", name, std::process::id()))
    }

    #[tokio::test]
    async fn missing_config_falls_back_to_defaults() {
        let storage = AsyncStorageManager::new(scratch_dir("defaults")).await.unwrap();
        let config = AppConfig::load_or_default(&storage).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.chart.tick_count, 11);
        assert_eq!(config.market_chart.coin_ids["AVAX"], "avalanche-2");
    }

    #[tokio::test]
    async fn partial_config_keeps_defaults_for_the_rest() {
        let dir = scratch_dir("partial");
        let storage = AsyncStorageManager::new(&dir).await.unwrap();
        storage
            .save_bytes(
                "config.json",
                br#"{ "chart": { "tick_count": 7 }, "default_tickers": { "cryptocurrencies": ["X:GOOG"] } }"#,
            )
            .await
            .unwrap();

        let config = AppConfig::load_or_default(&storage).await.unwrap();
        assert_eq!(config.chart.tick_count, 7);
        assert_eq!(config.chart.max_concurrent_fetches, 4);
        assert_eq!(config.default_tickers_for(None).unwrap(), &["X:GOOG".to_string()]);
        assert_eq!(config.range_aggregate.minute_interval_max_days, 60);

        fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn zero_tick_count_or_timeout_is_rejected_on_load() {
        for (name, body, field) in [
            ("zero-ticks", r#"{ "chart": { "tick_count": 0 } }"#, "tick_count"),
            ("zero-timeout", r#"{ "chart": { "fetch_timeout_secs": 0 } }"#, "fetch_timeout_secs"),
            ("bad-category", r#"{ "default_category": "bonds" }"#, "default_category"),
        ] {
            let dir = scratch_dir(name);
            let storage = AsyncStorageManager::new(&dir).await.unwrap();
            storage.save_bytes("config.json", body.as_bytes()).await.unwrap();

            let err = AppConfig::load_or_default(&storage).await.unwrap_err();
            assert!(err.to_string().contains(field), "{name}: {err}");

            fs::remove_dir_all(dir).await.unwrap();
        }
    }

    #[test]
    fn ticker_categories_carry_the_built_in_sets() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.ticker_categories().collect::<Vec<_>>(),
            vec!["cryptocurrencies", "mixed", "stocks"]
        );
        assert_eq!(config.default_tickers_for(None).unwrap()[0], "BTC");
        assert_eq!(config.default_tickers_for(Some("stocks")).unwrap()[0], "X:GOOG");
        assert_eq!(config.default_tickers_for(Some("mixed")).unwrap()[3], "X:AVAXUSD");
        assert!(config.default_tickers_for(Some("bonds")).is_none());
    }

    #[tokio::test]
    async fn save_then_load_through_the_atomic_path() {
        let dir = scratch_dir("roundtrip");
        let storage = AsyncStorageManager::new(&dir).await.unwrap();
        let pics = storage.child("pics").await.unwrap();

        let path = pics.save_bytes("chart.txt", b"hello").await.unwrap();
        assert_eq!(fs::read(&path).await.unwrap(), b"hello");
        assert!(!pics.base_dir.join("chart.txt.tmp").exists());

        fs::remove_dir_all(dir).await.unwrap();
    }
}
