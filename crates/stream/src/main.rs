//! Quote stream - runs a live pivot over a quote feed and prints chart deltas.

use anyhow::{Context, Result};
use clap::Parser;
use quote_core::Config;
use quote_stream::{BatchSource, ReplaySource, SimulatedSource, StopReason, StreamDriver, StreamEngine};
use quote_view::ViewSnapshot;
use std::io::Write;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "quote-stream", version, about = "Stream quotes into a live pivoted chart view")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Replay batches from a JSON file instead of the simulated feed
    #[arg(short, long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Stop after this many delivery cycles
    #[arg(short, long)]
    ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quote_stream=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let config = Config::from_json_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => Config::default(),
    };
    if args.ticks.is_some() {
        config.stream.max_ticks = args.ticks;
    }

    let mut engine = StreamEngine::new(&config).context("building stream engine")?;
    let mut source: Box<dyn BatchSource> = match &args.replay {
        Some(path) => Box::new(
            ReplaySource::from_json_file(path)
                .with_context(|| format!("loading replay from {}", path.display()))?,
        ),
        None => Box::new(SimulatedSource::new(&config.stream, chrono::Utc::now())),
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping stream");
            let _ = stop_tx.send(true);
        }
    });

    let driver = StreamDriver::new(
        Duration::from_millis(config.stream.poll_interval_ms),
        config.stream.max_ticks,
    );

    let stdout = std::io::stdout();
    let mut previous: ViewSnapshot = engine.snapshot().clone();
    let mut write_error: Option<std::io::Error> = None;
    let outcome = driver
        .run(&mut engine, source.as_mut(), stop_rx, |snapshot| {
            let delta = snapshot.diff(&previous);
            previous = snapshot.clone();
            if delta.is_empty() {
                return ControlFlow::Continue(());
            }
            let line = serde_json::to_string(&delta).map_err(std::io::Error::from);
            match line.and_then(|line| writeln!(stdout.lock(), "{line}")) {
                Ok(()) => ControlFlow::Continue(()),
                Err(err) => {
                    write_error = Some(err);
                    ControlFlow::Break(())
                }
            }
        })
        .await;

    if let Some(err) = write_error {
        return Err(err).context("writing snapshot delta");
    }

    let stats = engine.stats();
    info!(
        batches = stats.batches,
        rows = stats.rows,
        buckets = engine.table().len(),
        missing_ask = stats.missing_ask,
        missing_bid = stats.missing_bid,
        "Stream summary"
    );

    if let StopReason::Fatal(reason) = outcome.reason {
        error!("Stream halted: {}", reason);
        anyhow::bail!("stream halted: {reason}");
    }
    Ok(())
}
