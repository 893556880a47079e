//! NQ Fuse CLI: offline scoring, a headless live session, and config management.
//!
//! Commands:
//! - `score`: score a CSV file of minute bars and print the results as JSON
//! - `run`: run the fused engine against the live reference feed
//! - `config init`: write the default configuration file

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use nqfuse_core::analysis::IndicatorEngine;
use nqfuse_core::clock::FeedClock;
use nqfuse_core::data::YahooProvider;
use nqfuse_core::domain::Bar;
use nqfuse_core::extraction::{UnavailableCapture, UnavailableRecognizer};
use nqfuse_core::scoring::{view_biases, BiasScorer, ConfluenceScorer};
use nqfuse_core::series::OpeningRange;
use nqfuse_runner::config::ConfigStore;
use nqfuse_runner::{
    events, Collaborators, EngineEvent, FusionConfig, FusionEngine, MemoryConfigStore,
    TomlConfigStore,
};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Parser)]
#[command(name = "nqfuse", about = "NQ Fuse: fused live price feed with bias and confluence scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a CSV of minute bars (timestamp,open,high,low,close,volume).
    Score {
        /// Path to the CSV file.
        csv: PathBuf,

        /// Opening-range high. Requires --or-low; the range is treated as complete.
        #[arg(long, requires = "or_low")]
        or_high: Option<f64>,

        /// Opening-range low. Requires --or-high.
        #[arg(long, requires = "or_high")]
        or_low: Option<f64>,
    },
    /// Run a headless session on the live reference feed.
    Run {
        /// Path to a TOML config file. Region changes are saved back to it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop after this many seconds. Runs until killed when omitted.
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Configuration commands.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration.
    Init {
        /// Destination file.
        #[arg(long, default_value = "nqfuse.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Score {
            csv,
            or_high,
            or_low,
        } => run_score(&csv, or_high.zip(or_low)),
        Commands::Run { config, seconds } => run_session(config.as_deref(), seconds),
        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => run_config_init(&path, force),
        },
    }
}

// ── score ──

#[derive(Debug, Deserialize)]
struct CsvBar {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Parse bars from CSV text. Rows must be in ascending time order.
fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars: Vec<Bar> = Vec::new();
    for (i, row) in rdr.deserialize::<CsvBar>().enumerate() {
        let line = i + 2;
        let row = row.with_context(|| format!("line {line}"))?;
        let ts = NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_FORMAT)
            .with_context(|| format!("line {line}: bad timestamp '{}'", row.timestamp))?;
        if let Some(prev) = bars.last() {
            if ts <= prev.ts {
                bail!("line {line}: timestamps must be strictly ascending");
            }
        }
        if row.volume < 0.0 || !row.volume.is_finite() {
            bail!("line {line}: bad volume {}", row.volume);
        }
        bars.push(Bar {
            ts,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume as u64,
        });
    }
    Ok(bars)
}

fn run_score(path: &Path, opening_range: Option<(f64, f64)>) -> Result<()> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let bars = read_bars(file)?;
    if bars.is_empty() {
        bail!("{} contains no bars", path.display());
    }
    let opening_range = match opening_range {
        Some((high, low)) if high < low => bail!("--or-high ({high}) is below --or-low ({low})"),
        Some((high, low)) => OpeningRange::fixed(high, low),
        None => OpeningRange::default(),
    };

    let bar_count = bars.len();
    let analysis = IndicatorEngine::default().analyze(bars);
    let scorer = BiasScorer::new();
    let report = serde_json::json!({
        "bars": bar_count,
        "bias": scorer.evaluate(&analysis.base),
        "confluence": ConfluenceScorer::new().evaluate(&analysis.base, &analysis.views, opening_range),
        "timeframes": view_biases(&scorer, &analysis.views),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

// ── run ──

fn run_session(config_path: Option<&Path>, seconds: Option<u64>) -> Result<()> {
    let (config, store): (FusionConfig, Arc<dyn ConfigStore>) = match config_path {
        Some(path) => {
            let config = FusionConfig::load_or_default(path)?;
            let store = TomlConfigStore::new(path, config.clone());
            (config, Arc::new(store))
        }
        None => (FusionConfig::default(), Arc::new(MemoryConfigStore::new())),
    };
    let tz = config.tz()?;

    let (sender, rx) = events::channel();
    let engine = FusionEngine::new(
        &config,
        Collaborators {
            provider: Arc::new(YahooProvider::new(tz)?),
            capture: Arc::new(UnavailableCapture),
            recognizer: Arc::new(UnavailableRecognizer),
            store,
            clock: Arc::new(FeedClock::new(tz)),
        },
        sender,
    )?;
    info!(symbol = %config.symbol, timezone = %config.timezone, "starting session");
    engine.start()?;

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    loop {
        let wait = match deadline {
            Some(d) => match d.checked_duration_since(Instant::now()) {
                Some(left) => left,
                None => break,
            },
            None => Duration::from_secs(1),
        };
        match rx.recv_timeout(wait) {
            Ok(event) => log_event(&event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    engine.stop();
    let snapshot = engine.snapshot();
    println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    Ok(())
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::PriceUpdated { price, source, at } => {
            info!(price, ?source, %at, "price");
        }
        EngineEvent::BiasUpdated(result) => {
            info!(bias = ?result.bias, score = result.score, ready = result.ready, "bias");
        }
        EngineEvent::ConfluenceUpdated(result) => {
            info!(bias = ?result.bias, score = result.score, reasons = result.reasons.len(), "confluence");
        }
        EngineEvent::OpeningRangeUpdated(or) => {
            info!(high = ?or.high, low = ?or.low, ready = or.ready, "opening range");
        }
        EngineEvent::BiasChanged { from, to, score, at } => {
            info!(?from, ?to, score, %at, "bias changed");
        }
        EngineEvent::Warning(message) => warn!("{message}"),
    }
}

// ── config ──

fn run_config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    FusionConfig::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
