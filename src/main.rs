use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use stonks_chart::command;
use stonks_chart::render::{ChartRenderer, JsonRenderer, Renderer, TableRenderer};
use stonks_chart::storage_utils::{AppConfig, AsyncStorageManager};
use stonks_chart::{ProviderRegistry, StonksChart};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Table,
    Chart,
    Json,
}

/// Compare the relative price history of cryptocurrencies and stocks.
#[derive(Parser, Debug)]
#[command(name = "stonks", version)]
struct Cli {
    /// Number of days to look back, or "max"
    range: Option<String>,

    /// Tickers: 'X:SYMBOL' for Polygon, anything else for CoinGecko
    instruments: Vec<String>,

    /// Default ticker set to chart when no tickers are given
    /// (cryptocurrencies, stocks, mixed)
    #[arg(long)]
    category: Option<String>,

    #[arg(long, value_enum, default_value_t = Format::Table)]
    format: Format,

    /// Write the output under <config-dir>/pics instead of printing it
    #[arg(long)]
    save: bool,

    /// Directory holding config.json (defaults to ./storage next to the binary)
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    // RUST_LOG wins, then LOG_LEVEL, then info.
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    // Step 1: Load Config
    let storage = match &cli.config_dir {
        Some(dir) => AsyncStorageManager::new(dir).await?,
        None => AsyncStorageManager::new_relative("storage").await?,
    };
    let config = AppConfig::load_or_default(&storage).await?;

    // Step 2: Build Request
    let request = command::parse_request(
        cli.range.as_deref(),
        &cli.instruments,
        cli.category.as_deref(),
        &config,
    )?;
    tracing::info!(range = %request.range, instruments = ?request.instruments, "building chart");

    // Step 3: Fetch + Align
    let registry = ProviderRegistry::from_config(&config, config.range_aggregate_api_key())?;
    let chart = StonksChart::new(registry, config.chart.clone());
    let outcome = match chart.build(&request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error generating chart: {}", e);
            return Err(e.into());
        }
    };
    for warning in &outcome.warnings {
        eprintln!("Skipped {}: {}", warning.instrument, warning.reason);
    }

    // Step 4: Render
    let renderer: Box<dyn Renderer> = match cli.format {
        Format::Table => Box::new(TableRenderer),
        Format::Chart => Box::new(ChartRenderer::default()),
        Format::Json => Box::new(JsonRenderer),
    };
    let blob = renderer.render(&outcome.dataset)?;

    if cli.save {
        let mut args: Vec<String> = cli.range.iter().cloned().collect();
        args.extend(cli.instruments.iter().cloned());
        let file_name = command::output_file_name(&args, renderer.extension());

        let pics = storage.child("pics").await?;
        let path = pics.save_bytes(&file_name, &blob).await?;
        println!("Chart saved as {}", path.display());
    } else {
        print!("{}", String::from_utf8_lossy(&blob));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stonks_chart::ChartError;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("stonks").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn arguments_parse_into_the_cli() {
        let cli = cli(&["30", "BTC", "X:GOOG", "--format", "json", "--save"]);
        assert_eq!(cli.range.as_deref(), Some("30"));
        assert_eq!(cli.instruments, vec!["BTC".to_string(), "X:GOOG".to_string()]);
        assert!(matches!(cli.format, Format::Json));
        assert!(cli.save);
        assert!(cli.category.is_none());
    }

    #[tokio::test]
    async fn request_errors_come_back_as_results() {
        let dir = std::env::temp_dir().join(format!("stonks-main-{}", std::process::id()));
        let dir_arg = dir.to_string_lossy().into_owned();

        let err = run(cli(&["30", "--category", "bonds", "--config-dir", &dir_arg]))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChartError>(),
            Some(ChartError::UnknownTickerCategory { .. })
        ));

        let err = run(cli(&["0", "--config-dir", &dir_arg])).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ChartError>(), Some(ChartError::InvalidRange(_))));

        tokio::fs::remove_dir_all(dir).await.unwrap();
    }
}
