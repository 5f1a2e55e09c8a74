//! KlineLab CLI: sync, quote, analyze and forecast commands.
//!
//! Commands:
//! - `sync`: bring the Parquet candle store up to date from Binance
//! - `quote`: print the real-time quote table
//! - `analyze`: quote plus trading strategy
//! - `forecast`: daily close forecast for the next N days
//!
//! Analytical degradations (upstream down, short history) are printed and
//! exit 0; only argument and config errors fail the process.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use klinelab_core::data::{
    BinanceFeed, CircuitBreaker, FixedDelay, ParquetStore, PriceFeed, SyncEngine,
};
use klinelab_core::domain::normalize_symbol;
use klinelab_core::{KlineLabConfig, MarketAnalyst, StrategyEngine};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "klinelab",
    about = "KlineLab CLI: kline sync and technical strategy analysis"
)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of Markdown.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the persisted daily series up to today.
    Sync {
        #[arg(long, default_value = "BTCUSDT")]
        symbol: String,

        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        store: PathBuf,

        /// Sync up to this date (YYYY-MM-DD) instead of today.
        #[arg(long)]
        until: Option<String>,
    },
    /// Real-time quote.
    Quote {
        #[arg(long, default_value = "BTC")]
        symbol: String,
    },
    /// Quote plus strategy decision.
    Analyze {
        #[arg(long, default_value = "BTC")]
        symbol: String,
    },
    /// Forecast daily closes.
    Forecast {
        #[arg(long, default_value = "BTC")]
        symbol: String,

        /// Days to forecast. Defaults to the configured horizon.
        #[arg(long)]
        days: Option<usize>,

        /// Master seed for the fallback model.
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync {
            symbol,
            store,
            until,
        } => run_sync(&config, &symbol, store, until, cli.json),
        Commands::Quote { symbol } => run_quote(config, &symbol, cli.json),
        Commands::Analyze { symbol } => run_analyze(config, &symbol, cli.json),
        Commands::Forecast { symbol, days, seed } => {
            if let Some(seed) = seed {
                config.forecast.master_seed = seed;
            }
            let days = days.unwrap_or(config.forecast.default_horizon);
            run_forecast(config, &symbol, days, cli.json)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<KlineLabConfig> {
    match path {
        Some(p) => KlineLabConfig::load(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(KlineLabConfig::default()),
    }
}

fn build_feed(config: &KlineLabConfig) -> Result<Arc<dyn PriceFeed>> {
    let circuit_breaker = Arc::new(CircuitBreaker::default_exchange());
    let feed = BinanceFeed::new(&config.feed, circuit_breaker)
        .context("failed to initialise the Binance client")?;
    Ok(Arc::new(feed))
}

fn build_analyst(config: KlineLabConfig) -> Result<MarketAnalyst> {
    let feed = build_feed(&config)?;
    Ok(MarketAnalyst::new(feed, StrategyEngine::new(config)))
}

fn run_sync(
    config: &KlineLabConfig,
    symbol: &str,
    store_dir: PathBuf,
    until: Option<String>,
    json: bool,
) -> Result<()> {
    let symbol = normalize_symbol(symbol)?;
    let until = until
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("--until must be YYYY-MM-DD")?;

    let engine = SyncEngine::new(
        symbol,
        build_feed(config)?,
        Arc::new(ParquetStore::new(store_dir)),
        Arc::new(FixedDelay::new(Duration::from_millis(config.sync.throttle_ms))),
        config.sync.clone(),
    );
    let outcome = match until {
        Some(date) => engine.sync_until(date),
        None => engine.sync(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("{}: {}", engine.symbol(), outcome.status);
    for w in &outcome.failed_windows {
        println!("  window {} .. {} failed: {}", w.start, w.end, w.error);
    }
    if outcome.dropped_rows > 0 {
        println!("  dropped {} malformed rows", outcome.dropped_rows);
    }
    Ok(())
}

fn run_quote(config: KlineLabConfig, symbol: &str, json: bool) -> Result<()> {
    let analyst = build_analyst(config)?;
    match analyst.quote(symbol) {
        Ok(quote) if json => println!("{}", serde_json::to_string_pretty(&quote)?),
        Ok(quote) => print!("{}", klinelab_core::strategy::format_quote(&quote)),
        Err(e) => println!("Could not fetch the quote: {e}"),
    }
    Ok(())
}

fn run_analyze(config: KlineLabConfig, symbol: &str, json: bool) -> Result<()> {
    let analyst = build_analyst(config)?;
    match analyst.analyze(symbol) {
        Ok(report) if json => println!("{}", serde_json::to_string_pretty(&report)?),
        Ok(report) => {
            print!("{}", report.text);
            for w in &report.warnings {
                println!("\n> {w}");
            }
        }
        Err(e) => println!("Analysis failed: {e}"),
    }
    Ok(())
}

fn run_forecast(config: KlineLabConfig, symbol: &str, days: usize, json: bool) -> Result<()> {
    let analyst = build_analyst(config)?;
    match analyst.forecast(symbol, days) {
        Ok(report) if json => println!("{}", serde_json::to_string_pretty(&report)?),
        Ok(report) => {
            for w in &report.warnings {
                println!("> {w}\n");
            }
            print!("{}", report.text);
        }
        Err(e) => println!("Forecast failed: {e}"),
    }
    Ok(())
}
