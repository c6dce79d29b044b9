use super::Point;

/// Rolling z-score over the last `window` samples, aligned to the input.
///
/// Entry `i` is `(v[i] - mean) / stdev` over `v[i+1-window..=i]` with the
/// sample standard deviation. The first `window - 1` entries, windows with
/// zero variance, and windows containing a non-finite value are NaN. A window
/// below 2 has no sample deviation, so every entry is NaN.
pub fn rolling_zscore_values(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window < 2 || values.len() < window {
        return out;
    }

    for (i, slot) in out.iter_mut().enumerate().skip(window - 1) {
        let w = &values[i + 1 - window..=i];
        if w.iter().any(|v| !v.is_finite()) {
            continue;
        }
        let (lo, hi) = w
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        if lo == hi {
            continue;
        }
        let mean = w.iter().sum::<f64>() / window as f64;
        let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
        let sd = var.sqrt();
        if sd > 0.0 {
            *slot = (values[i] - mean) / sd;
        }
    }
    out
}

pub fn rolling_zscore(series: &[Point], window: usize) -> Vec<Point> {
    let values: Vec<f64> = series.iter().map(|p| p.value).collect();
    series
        .iter()
        .zip(rolling_zscore_values(&values, window))
        .map(|(p, z)| Point::new(p.timestamp_ms, z))
        .collect()
}

/// Most recent defined value of a z-score series.
pub fn latest_defined(series: &[Point]) -> Option<Point> {
    series.iter().rev().find(|p| p.value.is_finite()).copied()
}
