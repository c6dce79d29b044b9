use std::time::Duration;

use anyhow::{Context, Result};

use pair_analytics::config::Config;
use pair_analytics::tick_store::TickStore;

const DEFAULT_POLLS: u32 = 6;
const POLL_EVERY: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let polls = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<u32>()
            .with_context(|| format!("invalid poll count '{}'", arg))?,
        None => DEFAULT_POLLS,
    };

    let store = TickStore::open(&config.store.path)
        .with_context(|| format!("failed to open {}", config.store.path))?;

    for i in 0..polls {
        println!("Poll {}:", i + 1);
        let counts = store.symbol_counts()?;
        if counts.is_empty() {
            println!("No rows found in ticks table yet.");
        }
        for (symbol, count) in counts {
            let latest = store
                .get_latest_timestamp(&symbol)?
                .map(pair_analytics::analytics::export::format_timestamp)
                .unwrap_or_else(|| "-".to_string());
            println!("{}: {} (latest {})", symbol, count, latest);
        }
        if i + 1 < polls {
            std::thread::sleep(POLL_EVERY);
        }
    }
    Ok(())
}
