use anyhow::{bail, Context, Result};

use pair_analytics::analytics::export::ticks_from_ohlc_csv;
use pair_analytics::analytics::pipeline::{analyze_pair, analyze_ticks, PairAnalysis, PairRequest};
use pair_analytics::analytics::stationarity::Significance;
use pair_analytics::analytics::Computed;
use pair_analytics::config::Config;
use pair_analytics::tick_store::TickStore;

fn usage() -> ! {
    eprintln!("usage: pair-report <Y> <X> [out.csv] [--y-csv <ohlc.csv> --x-csv <ohlc.csv>]");
    std::process::exit(2);
}

struct Args {
    y: String,
    x: String,
    out: Option<String>,
    y_csv: Option<String>,
    x_csv: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut y_csv = None;
    let mut x_csv = None;
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--y-csv" => y_csv = Some(it.next().context("--y-csv needs a path")?),
            "--x-csv" => x_csv = Some(it.next().context("--x-csv needs a path")?),
            "-h" | "--help" => usage(),
            _ => positional.push(arg),
        }
    }
    if positional.len() < 2 || positional.len() > 3 {
        usage();
    }
    if y_csv.is_some() != x_csv.is_some() {
        bail!("--y-csv and --x-csv must be given together");
    }
    let mut positional = positional.into_iter();
    Ok(Args {
        y: positional.next().unwrap_or_default().to_ascii_uppercase(),
        x: positional.next().unwrap_or_default().to_ascii_uppercase(),
        out: positional.next(),
        y_csv,
        x_csv,
    })
}

fn print_report(a: &PairAnalysis) {
    println!("Pair {} ~ {}", a.y_symbol, a.x_symbol);
    println!("  bars           {} / {}", a.y_bars.len(), a.x_bars.len());
    println!("  regression     {}", a.hedge.kind);
    println!("  hedge beta     {:.6}", a.hedge.beta);
    println!("  intercept      {:.6}", a.hedge.intercept);
    println!("  ssr            {:.6}", a.hedge.ssr);
    match a.latest_spread() {
        Some(s) => println!("  latest spread  {:.6}", s),
        None => println!("  latest spread  n/a"),
    }
    match a.latest_zscore() {
        Some(z) => println!("  latest z       {:.3}", z),
        None => println!("  latest z       n/a"),
    }
    match &a.adf {
        Some(Computed::Ready(r)) => {
            println!(
                "  ADF            stat={:.4} p={:.4} lag={} nobs={}",
                r.statistic, r.p_value, r.used_lag, r.nobs
            );
            for level in Significance::ALL {
                println!("    crit {:>4}    {:.4}", level.label(), r.critical_value(level));
            }
        }
        Some(Computed::NotComputable(why)) => println!("  ADF            {}", why),
        None => {}
    }
    if a.alert_triggered() {
        println!("  ALERT: |z| >= {}", a.alert_z);
    }
}

fn main() -> Result<()> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let now_ms = chrono::Utc::now().timestamp_millis();
    let req = PairRequest::from_config(&config.analytics, &args.y, &args.x, now_ms);

    let computed = match (&args.y_csv, &args.x_csv) {
        (Some(y_path), Some(x_path)) => {
            let mut ticks = ticks_from_ohlc_csv(
                &std::fs::read_to_string(y_path).with_context(|| format!("read {}", y_path))?,
                &args.y,
            )?;
            ticks.extend(ticks_from_ohlc_csv(
                &std::fs::read_to_string(x_path).with_context(|| format!("read {}", x_path))?,
                &args.x,
            )?);
            analyze_ticks(&ticks, &req)
        }
        _ => {
            let store = TickStore::open(&config.store.path)?;
            analyze_pair(&store, &req)?
        }
    };

    let analysis = match computed {
        Computed::Ready(a) => a,
        Computed::NotComputable(why) => {
            println!("Not enough overlapping data to compute hedge ({})", why);
            return Ok(());
        }
    };
    print_report(&analysis);

    if let Some(path) = args.out {
        std::fs::write(&path, analysis.to_table().to_csv_bytes())
            .with_context(|| format!("failed to write {}", path))?;
        println!("Wrote {}", path);
    }
    Ok(())
}
