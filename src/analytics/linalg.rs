//! Dense least squares via Householder QR.
//!
//! Regressions here are tall and thin (hundreds of rows, a handful of
//! columns), so the design matrix is stored column-major as one `Vec<f64>`
//! per regressor.

/// Columns whose diagonal in R falls below this fraction of the largest
/// diagonal are treated as linearly dependent.
const RANK_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct LeastSquares {
    pub coefficients: Vec<f64>,
    pub residuals: Vec<f64>,
    /// Residual sum of squares.
    pub ssr: f64,
    pub nobs: usize,
    /// Diagonal of (XᵀX)⁻¹.
    unscaled_cov_diag: Vec<f64>,
}

impl LeastSquares {
    pub fn k(&self) -> usize {
        self.coefficients.len()
    }

    pub fn df_resid(&self) -> usize {
        self.nobs - self.k()
    }

    /// Standard error of coefficient `i` under homoskedastic errors.
    pub fn std_error(&self, i: usize) -> f64 {
        let df = self.df_resid();
        if df == 0 {
            return f64::NAN;
        }
        let sigma2 = self.ssr / df as f64;
        (sigma2 * self.unscaled_cov_diag[i]).sqrt()
    }

    pub fn t_value(&self, i: usize) -> f64 {
        self.coefficients[i] / self.std_error(i)
    }

    /// Akaike information criterion of the Gaussian log-likelihood.
    pub fn aic(&self) -> f64 {
        let n = self.nobs as f64;
        let llf = -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0);
        -2.0 * llf + 2.0 * self.k() as f64
    }
}

/// Solve `min ||y - X b||` for column-major `columns`. Returns `None` when the
/// system is underdetermined or the columns are (numerically) dependent.
pub fn lstsq(columns: &[Vec<f64>], y: &[f64]) -> Option<LeastSquares> {
    let n = y.len();
    let k = columns.len();
    if k == 0 || n < k || columns.iter().any(|c| c.len() != n) {
        return None;
    }

    let mut a: Vec<Vec<f64>> = columns.to_vec();
    let mut b: Vec<f64> = y.to_vec();

    for j in 0..k {
        let norm = a[j][j..].iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return None;
        }
        let alpha = if a[j][j] > 0.0 { -norm } else { norm };
        let mut v: Vec<f64> = a[j][j..].to_vec();
        v[0] -= alpha;
        let vv: f64 = v.iter().map(|x| x * x).sum();
        if vv == 0.0 {
            continue;
        }
        for col in a.iter_mut().skip(j) {
            reflect(&v, vv, &mut col[j..]);
        }
        reflect(&v, vv, &mut b[j..]);
    }

    let max_diag = (0..k).map(|i| a[i][i].abs()).fold(0.0_f64, f64::max);
    if (0..k).any(|i| a[i][i].abs() <= RANK_TOLERANCE * max_diag) {
        return None;
    }

    // Back-substitute R c = Qᵀy; R[i][j] lives at a[j][i].
    let mut coefficients = vec![0.0; k];
    for i in (0..k).rev() {
        let tail: f64 = (i + 1..k).map(|j| a[j][i] * coefficients[j]).sum();
        coefficients[i] = (b[i] - tail) / a[i][i];
    }

    let residuals: Vec<f64> = (0..n)
        .map(|r| {
            let fitted: f64 = (0..k).map(|j| columns[j][r] * coefficients[j]).sum();
            y[r] - fitted
        })
        .collect();
    let ssr = residuals.iter().map(|e| e * e).sum();

    Some(LeastSquares {
        coefficients,
        residuals,
        ssr,
        nobs: n,
        unscaled_cov_diag: inverse_gram_diagonal(&a, k),
    })
}

/// Apply H = I - 2vvᵀ/(vᵀv) to `x` in place.
fn reflect(v: &[f64], vv: f64, x: &mut [f64]) {
    let dot: f64 = v.iter().zip(x.iter()).map(|(a, b)| a * b).sum();
    let scale = 2.0 * dot / vv;
    for (xi, vi) in x.iter_mut().zip(v) {
        *xi -= scale * vi;
    }
}

/// diag((XᵀX)⁻¹) = diag(R⁻¹R⁻ᵀ), i.e. squared row norms of R⁻¹.
fn inverse_gram_diagonal(a: &[Vec<f64>], k: usize) -> Vec<f64> {
    // rinv[i][j] for j >= i, row-major.
    let mut rinv = vec![vec![0.0; k]; k];
    for col in 0..k {
        for i in (0..=col).rev() {
            let rhs = if i == col { 1.0 } else { 0.0 };
            let tail: f64 = (i + 1..=col).map(|j| a[j][i] * rinv[j][col]).sum();
            rinv[i][col] = (rhs - tail) / a[i][i];
        }
    }
    rinv.iter()
        .map(|row| row.iter().map(|v| v * v).sum())
        .collect()
}
