use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use pair_analytics::config::Config;
use pair_analytics::event::classify_feed_health;
use pair_analytics::ingest::IngestController;
use pair_analytics::tick_store::TickStore;

const DEFAULT_RUN_SECS: u64 = 20;
const STATUS_EVERY: Duration = Duration::from_secs(5);
const STALE_AFTER_MS: i64 = 30_000;

fn init_tracing(level: &str) -> Result<()> {
    // Log to file so status lines on stdout stay readable.
    let log_file = std::fs::File::create("pair-analytics.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                level
                    .parse()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            }),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Make sure config/default.toml exists (or set PAIR_ANALYTICS_CONFIG)");
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging.level)?;

    let run_secs = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<u64>()
            .with_context(|| format!("invalid duration '{}': expected seconds", arg))?,
        None => DEFAULT_RUN_SECS,
    };

    let symbols = config.binance.tradable_symbols();
    tracing::info!(
        symbols = ?symbols,
        ws_url = %config.binance.ws_base_url,
        store = %config.store.path,
        run_secs,
        "Starting pair-analytics ingest"
    );

    let store = TickStore::open(&config.store.path).context("failed to open tick store")?;
    let controller = Arc::new(IngestController::new(
        &config.binance.ws_base_url,
        symbols.clone(),
        Arc::clone(&store),
    ));
    controller.start().context("failed to start ingest worker")?;
    println!("Ingesting {:?} for {}s... (press Ctrl+C to stop)", symbols, run_secs);

    let deadline = tokio::time::sleep(Duration::from_secs(run_secs));
    tokio::pin!(deadline);
    let mut status_timer = tokio::time::interval(STATUS_EVERY);
    status_timer.tick().await;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received");
                break;
            }
            _ = status_timer.tick() => {
                let status = controller.status();
                let now_ms = chrono::Utc::now().timestamp_millis();
                for symbol in &symbols {
                    let latest = store.get_latest_timestamp(symbol)?;
                    let health = classify_feed_health(&status, latest, now_ms, STALE_AFTER_MS);
                    println!("{:<10} {:?}", symbol, health);
                }
                println!(
                    "phase={:?} stored={} dropped={} reconnects={}",
                    status.phase, status.ticks_stored, status.frames_dropped, status.reconnects
                );
            }
        }
    }

    let stopper = Arc::clone(&controller);
    let stopped_cleanly = tokio::task::spawn_blocking(move || stopper.stop()).await?;
    if !stopped_cleanly {
        eprintln!("Ingest worker did not exit within the stop deadline");
    }
    println!("Ingest stopped");

    for (symbol, count) in store.symbol_counts()? {
        println!("{}: {}", symbol, count);
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
