//! Augmented Dickey-Fuller unit-root test with a constant term.
//!
//! Lag order is chosen by minimum AIC over `0..=max_lag` on a common sample,
//! then the test regression is refit on the longest sample that lag allows.
//! P-values use MacKinnon's (1994) response-surface approximation and
//! critical values MacKinnon's (2010) finite-sample tables, both for the
//! single-series, constant-only case.

use statrs::function::erf::erfc;

use super::linalg::{lstsq, LeastSquares};
use super::Computed;

pub const MIN_ADF_OBSERVATIONS: usize = 10;

// MacKinnon (1994), constant, N = 1.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010), constant, N = 1: coefficients in powers of 1/nobs.
const CRIT_1PCT: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const CRIT_5PCT: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
const CRIT_10PCT: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Significance {
    OnePercent,
    FivePercent,
    TenPercent,
}

impl Significance {
    pub const ALL: [Significance; 3] = [
        Significance::OnePercent,
        Significance::FivePercent,
        Significance::TenPercent,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::OnePercent => "1%",
            Self::FivePercent => "5%",
            Self::TenPercent => "10%",
        }
    }

    pub fn alpha(self) -> f64 {
        match self {
            Self::OnePercent => 0.01,
            Self::FivePercent => 0.05,
            Self::TenPercent => 0.10,
        }
    }

    fn surface(self) -> &'static [f64; 4] {
        match self {
            Self::OnePercent => &CRIT_1PCT,
            Self::FivePercent => &CRIT_5PCT,
            Self::TenPercent => &CRIT_10PCT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    pub nobs: usize,
    pub critical_values: [(Significance, f64); 3],
    /// AIC of the selected lag order.
    pub ic_best: f64,
}

impl AdfResult {
    pub fn critical_value(&self, level: Significance) -> f64 {
        self.critical_values
            .iter()
            .find(|(l, _)| *l == level)
            .map(|(_, v)| *v)
            .unwrap_or(f64::NAN)
    }

    /// Whether the unit root is rejected at `alpha`.
    pub fn is_stationary_at(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// ADF test with the default maximum lag `ceil(12 * (n / 100)^(1/4))`.
/// Non-finite values are dropped first.
pub fn adf(series: &[f64]) -> Computed<AdfResult> {
    adf_with_max_lag(series, None)
}

pub fn adf_with_max_lag(series: &[f64], max_lag: Option<usize>) -> Computed<AdfResult> {
    let x: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    let n = x.len();
    if n < MIN_ADF_OBSERVATIONS {
        return Computed::insufficient(MIN_ADF_OBSERVATIONS, n);
    }

    // One constant plus the lagged level must leave room for the lags.
    let lag_cap = n / 2 - 2;
    let default_lag = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    let max_lag = max_lag.unwrap_or(default_lag).min(lag_cap);

    let diffs: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=max_lag {
        let (columns, y) = design(&x, &diffs, lag, max_lag);
        if let Some(fit) = lstsq(&columns, &y) {
            let aic = fit.aic();
            if aic.is_finite() && best.map_or(true, |(b, _)| aic < b) {
                best = Some((aic, lag));
            }
        }
    }
    let Some((ic_best, used_lag)) = best else {
        return Computed::degenerate("no lag order produced a usable fit");
    };

    let (columns, y) = design(&x, &diffs, used_lag, used_lag);
    let Some(fit) = lstsq(&columns, &y) else {
        return Computed::degenerate("test regression is rank deficient");
    };
    if fit.df_resid() == 0 {
        return Computed::degenerate("no residual degrees of freedom");
    }
    let statistic = level_t_value(&fit);
    if !statistic.is_finite() {
        return Computed::degenerate("test regression fits exactly");
    }

    let nobs = fit.nobs;
    let critical_values = Significance::ALL.map(|level| (level, critical_value(level, nobs)));
    Computed::Ready(AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic),
        used_lag,
        nobs,
        critical_values,
        ic_best,
    })
}

/// Regression of Δx_t on [const, x_{t-1}, Δx_{t-1} .. Δx_{t-lag}], using only
/// rows available after dropping the first `trim` differences.
fn design(x: &[f64], diffs: &[f64], lag: usize, trim: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let rows = trim..diffs.len();
    let nobs = rows.len();
    let mut columns = Vec::with_capacity(lag + 2);
    columns.push(vec![1.0; nobs]);
    columns.push(rows.clone().map(|t| x[t]).collect());
    for j in 1..=lag {
        columns.push(rows.clone().map(|t| diffs[t - j]).collect());
    }
    let y = rows.map(|t| diffs[t]).collect();
    (columns, y)
}

fn level_t_value(fit: &LeastSquares) -> f64 {
    fit.t_value(1)
}

fn polyval(coef: &[f64], x: f64) -> f64 {
    coef.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Approximate p-value of an ADF statistic (constant, one series).
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }
    let z = if statistic <= TAU_STAR {
        polyval(&TAU_SMALL_P, statistic)
    } else {
        polyval(&TAU_LARGE_P, statistic)
    };
    standard_normal_cdf(z)
}

/// Finite-sample critical value for `nobs` observations.
pub fn critical_value(level: Significance, nobs: usize) -> f64 {
    polyval(level.surface(), 1.0 / nobs as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polyval_uses_ascending_powers() {
        assert!((polyval(&[1.0, 2.0, 3.0], 2.0) - 17.0).abs() < 1e-12);
    }

    #[test]
    fn p_value_at_asymptotic_five_percent_point() {
        let p = mackinnon_p_value(-2.86154);
        assert!((p - 0.05).abs() < 0.005, "p = {}", p);
    }

    #[test]
    fn p_value_saturates_outside_surface() {
        assert_eq!(mackinnon_p_value(3.0), 1.0);
        assert_eq!(mackinnon_p_value(-25.0), 0.0);
    }

    #[test]
    fn p_value_is_monotone_in_statistic() {
        let mut prev = 0.0;
        for i in 0..200 {
            let stat = -18.0 + i as f64 * 0.1;
            let p = mackinnon_p_value(stat);
            assert!(p >= prev - 1e-9, "p({}) = {} < {}", stat, p, prev);
            prev = p;
        }
    }

    #[test]
    fn critical_values_approach_asymptotic_table() {
        assert!((critical_value(Significance::FivePercent, 1_000_000) + 2.86154).abs() < 1e-4);
        assert!(critical_value(Significance::OnePercent, 100) < critical_value(Significance::FivePercent, 100));
        assert!(critical_value(Significance::FivePercent, 100) < critical_value(Significance::TenPercent, 100));
    }

    #[test]
    fn design_aligns_level_and_lagged_differences() {
        let x = [1.0, 2.0, 4.0, 7.0, 11.0];
        let diffs: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let (columns, y) = design(&x, &diffs, 1, 1);
        assert_eq!(y, vec![2.0, 3.0, 4.0]);
        assert_eq!(columns[1], vec![2.0, 4.0, 7.0]);
        assert_eq!(columns[2], vec![1.0, 2.0, 3.0]);
    }
}
