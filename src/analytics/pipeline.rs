use std::collections::BTreeMap;

use super::export::Table;
use super::regression::{hedge_with, HedgeResult, RegressionKind};
use super::resample::{resample, ResampleRule};
use super::rolling::{latest_defined, rolling_zscore};
use super::stationarity::{adf, AdfResult};
use super::{values, Computed, Point};
use crate::config::AnalyticsConfig;
use crate::error::AppError;
use crate::model::candle::Candle;
use crate::model::tick::Tick;
use crate::tick_store::TickStore;

/// Parameters for one pair computation over stored ticks.
#[derive(Debug, Clone)]
pub struct PairRequest {
    pub y_symbol: String,
    pub x_symbol: String,
    pub rule: ResampleRule,
    pub regression: RegressionKind,
    pub rolling_window: usize,
    pub alert_z: f64,
    pub run_adf: bool,
    /// Window end; ticks in `[now_ms - lookback_ms, now_ms]` are used.
    pub now_ms: i64,
    pub lookback_ms: i64,
}

impl PairRequest {
    pub fn from_config(cfg: &AnalyticsConfig, y_symbol: &str, x_symbol: &str, now_ms: i64) -> Self {
        Self {
            y_symbol: y_symbol.to_string(),
            x_symbol: x_symbol.to_string(),
            rule: cfg.resample_rule,
            regression: cfg.regression,
            rolling_window: cfg.rolling_window,
            alert_z: cfg.alert_z,
            run_adf: true,
            now_ms,
            lookback_ms: (cfg.lookback_minutes as i64).saturating_mul(60_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PairAnalysis {
    pub y_symbol: String,
    pub x_symbol: String,
    pub y_bars: Vec<Candle>,
    pub x_bars: Vec<Candle>,
    pub hedge: HedgeResult,
    pub zscore: Vec<Point>,
    pub adf: Option<Computed<AdfResult>>,
    pub alert_z: f64,
}

impl PairAnalysis {
    pub fn latest_spread(&self) -> Option<f64> {
        self.hedge.latest_spread()
    }

    pub fn latest_zscore(&self) -> Option<f64> {
        latest_defined(&self.zscore).map(|p| p.value)
    }

    /// `|latest z| >= alert_z`.
    pub fn alert_triggered(&self) -> bool {
        self.latest_zscore()
            .is_some_and(|z| z.abs() >= self.alert_z)
    }

    /// Closes, spread and z-score outer-joined on bucket start.
    pub fn to_table(&self) -> Table {
        let mut rows: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        let mut put = |ts: i64, col: usize, v: f64| {
            rows.entry(ts).or_insert_with(|| vec![f64::NAN; 4])[col] = v;
        };
        for bar in &self.y_bars {
            put(bar.open_time, 0, bar.close);
        }
        for bar in &self.x_bars {
            put(bar.open_time, 1, bar.close);
        }
        for p in &self.hedge.spread {
            put(p.timestamp_ms, 2, p.value);
        }
        for p in &self.zscore {
            put(p.timestamp_ms, 3, p.value);
        }

        let mut table = Table::new(vec![
            format!("close_{}", self.y_symbol),
            format!("close_{}", self.x_symbol),
            "spread".to_string(),
            "zscore".to_string(),
        ]);
        for (ts, vals) in rows {
            table.push_row(ts, vals);
        }
        table
    }
}

/// Load the lookback window from `store` and run [`analyze_ticks`].
pub fn analyze_pair(
    store: &TickStore,
    req: &PairRequest,
) -> Result<Computed<PairAnalysis>, AppError> {
    let start = req.now_ms.saturating_sub(req.lookback_ms);
    let ticks = store.get_ticks(
        &[req.y_symbol.as_str(), req.x_symbol.as_str()],
        Some(start),
        Some(req.now_ms),
    )?;
    tracing::debug!(
        y = %req.y_symbol,
        x = %req.x_symbol,
        ticks = ticks.len(),
        "Loaded ticks for pair analysis"
    );
    Ok(analyze_ticks(&ticks, req))
}

/// Resample both legs, fit the hedge, score the spread and optionally test it
/// for stationarity. Every call recomputes from `ticks`.
pub fn analyze_ticks(ticks: &[Tick], req: &PairRequest) -> Computed<PairAnalysis> {
    let y_bars = resample(&req.y_symbol, ticks, req.rule);
    let x_bars = resample(&req.x_symbol, ticks, req.rule);

    let hedge = match hedge_with(req.regression, &y_bars, &x_bars) {
        Computed::Ready(h) => h,
        Computed::NotComputable(why) => return Computed::NotComputable(why),
    };
    let zscore = rolling_zscore(&hedge.spread, req.rolling_window);
    let stationarity = req.run_adf.then(|| adf(&values(&hedge.spread)));

    Computed::Ready(PairAnalysis {
        y_symbol: req.y_symbol.clone(),
        x_symbol: req.x_symbol.clone(),
        y_bars,
        x_bars,
        hedge,
        zscore,
        adf: stationarity,
        alert_z: req.alert_z,
    })
}
