//! Ordinary least squares on an ordered design matrix.
//!
//! Used to strip deterministic regressors (Fourier terms, drift) before an
//! error model is fitted on the residuals, and to pick harmonic counts.

use crate::error::{ForecastError, Result};

/// Named regressor columns over a fixed number of rows.
///
/// Column order is insertion order and is preserved in [`OlsFit`]. A design
/// without columns still has rows, so an intercept-only regression predicts
/// one value per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Regressors {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    rows: Option<usize>,
}

impl Regressors {
    /// Empty design whose row count is set by the first column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty design of `rows` rows.
    pub fn with_rows(rows: usize) -> Self {
        Self {
            rows: Some(rows),
            ..Self::default()
        }
    }

    /// Append a column. Every column must have [`rows`](Self::rows) values.
    pub fn push(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        match self.rows {
            Some(rows) if rows != values.len() => {
                return Err(ForecastError::DimensionMismatch {
                    expected: rows,
                    got: values.len(),
                });
            }
            Some(_) => {}
            None => self.rows = Some(values.len()),
        }
        self.names.push(name.into());
        self.columns.push(values);
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows (0 for a design from [`new`](Self::new) without columns).
    pub fn rows(&self) -> usize {
        self.rows.unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Row `i` across all columns.
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[i]).collect()
    }
}

/// Fitted linear regression `y = intercept + X beta`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OlsFit {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub names: Vec<String>,
    /// Residual sum of squares on the fitting data.
    pub rss: f64,
}

impl OlsFit {
    /// Evaluate the regression on new regressor rows.
    pub fn predict(&self, x: &Regressors) -> Result<Vec<f64>> {
        if x.names() != self.names.as_slice() {
            return Err(ForecastError::InvalidParameter(format!(
                "regressors {:?} do not match fitted {:?}",
                x.names(),
                self.names
            )));
        }
        let mut out = vec![self.intercept; x.rows()];
        for (beta, column) in self.coefficients.iter().zip(x.columns()) {
            for (o, v) in out.iter_mut().zip(column) {
                *o += beta * v;
            }
        }
        Ok(out)
    }

    /// `y - fitted` on the data the regression was fitted to.
    pub fn residuals(&self, y: &[f64], x: &Regressors) -> Result<Vec<f64>> {
        let fitted = self.predict(x)?;
        if fitted.len() != y.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: y.len(),
                got: fitted.len(),
            });
        }
        Ok(y.iter().zip(&fitted).map(|(a, f)| a - f).collect())
    }

    /// Gaussian AIC of the fit, counting the intercept and coefficients.
    pub fn aic(&self, n: usize) -> f64 {
        let k = self.coefficients.len() + 1;
        let n = n as f64;
        n * (self.rss / n).max(f64::MIN_POSITIVE).ln() + 2.0 * k as f64
    }
}

/// Fit OLS of `y` on `x` with an intercept, through the normal equations.
pub fn ols_fit(y: &[f64], x: &Regressors) -> Result<OlsFit> {
    let n = y.len();
    if n == 0 {
        return Err(ForecastError::EmptyData);
    }
    if x.rows.is_some() && x.rows() != n {
        return Err(ForecastError::DimensionMismatch {
            expected: n,
            got: x.rows(),
        });
    }
    let k = x.width() + 1;
    if n < k {
        return Err(ForecastError::InsufficientData { needed: k, got: n });
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    let mut row = vec![1.0; k];
    for obs in 0..n {
        for (j, column) in x.columns().iter().enumerate() {
            row[j + 1] = column[obs];
        }
        for i in 0..k {
            xty[i] += row[i] * y[obs];
            for j in 0..=i {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[j][i] = xtx[i][j];
        }
        xtx[i][i] += 1e-9 * (1.0 + xtx[i][i]);
    }

    let beta = solve_symmetric(&xtx, &xty).ok_or_else(|| {
        ForecastError::ComputationError("normal equations are not positive definite".into())
    })?;

    let rss = y
        .iter()
        .enumerate()
        .map(|(obs, v)| {
            let fitted = beta[0]
                + x.columns()
                    .iter()
                    .zip(&beta[1..])
                    .map(|(column, b)| b * column[obs])
                    .sum::<f64>();
            (v - fitted).powi(2)
        })
        .sum();
    Ok(OlsFit {
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
        names: x.names().to_vec(),
        rss,
    })
}

/// Solve `A x = b` for symmetric positive definite `A` by Cholesky.
pub fn solve_symmetric(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let sum = a[i][j] - (0..j).map(|k| l[i][k] * l[j][k]).sum::<f64>();
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    let mut z = vec![0.0; n];
    for i in 0..n {
        z[i] = (b[i] - (0..i).map(|j| l[i][j] * z[j]).sum::<f64>()) / l[i][i];
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        x[i] = (z[i] - ((i + 1)..n).map(|j| l[j][i] * x[j]).sum::<f64>()) / l[i][i];
    }
    Some(x)
}
