use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::linalg::lstsq;
use super::{Computed, Point};
use crate::model::candle::Candle;

/// Minimum overlapping bars needed to fit a line.
pub const MIN_HEDGE_OBSERVATIONS: usize = 2;

/// How the hedge ratio is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegressionKind {
    /// Static ordinary least squares over the whole window.
    #[default]
    Ols,
}

impl fmt::Display for RegressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ols => f.write_str("ols"),
        }
    }
}

impl FromStr for RegressionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ols" => Ok(Self::Ols),
            other => Err(format!("unsupported regression type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HedgeResult {
    pub kind: RegressionKind,
    pub intercept: f64,
    pub beta: f64,
    /// `y - (intercept + beta * x)` on the joined timestamps.
    pub spread: Vec<Point>,
    /// Residual sum of squares.
    pub ssr: f64,
}

impl HedgeResult {
    pub fn nobs(&self) -> usize {
        self.spread.len()
    }

    pub fn latest_spread(&self) -> Option<f64> {
        self.spread.last().map(|p| p.value)
    }
}

/// Inner-join two bar series on bucket start, keeping only rows where both
/// closes are finite. Output is ascending by timestamp as `(ts, y, x)`.
pub fn join_closes(y_bars: &[Candle], x_bars: &[Candle]) -> Vec<(i64, f64, f64)> {
    let x_by_ts: BTreeMap<i64, f64> = x_bars
        .iter()
        .filter(|b| b.close.is_finite())
        .map(|b| (b.open_time, b.close))
        .collect();
    let y_by_ts: BTreeMap<i64, f64> = y_bars
        .iter()
        .filter(|b| b.close.is_finite())
        .map(|b| (b.open_time, b.close))
        .collect();
    y_by_ts
        .into_iter()
        .filter_map(|(ts, y)| x_by_ts.get(&ts).map(|x| (ts, y, *x)))
        .collect()
}

/// OLS hedge of `y` on `x` closes.
pub fn hedge(y_bars: &[Candle], x_bars: &[Candle]) -> Computed<HedgeResult> {
    hedge_with(RegressionKind::Ols, y_bars, x_bars)
}

pub fn hedge_with(
    kind: RegressionKind,
    y_bars: &[Candle],
    x_bars: &[Candle],
) -> Computed<HedgeResult> {
    let joined = join_closes(y_bars, x_bars);
    if joined.len() < MIN_HEDGE_OBSERVATIONS {
        return Computed::insufficient(MIN_HEDGE_OBSERVATIONS, joined.len());
    }
    match kind {
        RegressionKind::Ols => ols_hedge(&joined),
    }
}

fn ols_hedge(joined: &[(i64, f64, f64)]) -> Computed<HedgeResult> {
    let y: Vec<f64> = joined.iter().map(|r| r.1).collect();
    let x: Vec<f64> = joined.iter().map(|r| r.2).collect();
    let Some(fit) = lstsq(&[vec![1.0; x.len()], x], &y) else {
        return Computed::degenerate("regressor has no variation");
    };

    let spread = joined
        .iter()
        .zip(&fit.residuals)
        .map(|(row, e)| Point::new(row.0, *e))
        .collect();
    Computed::Ready(HedgeResult {
        kind: RegressionKind::Ols,
        intercept: fit.coefficients[0],
        beta: fit.coefficients[1],
        spread,
        ssr: fit.ssr,
    })
}
