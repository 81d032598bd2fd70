//! Box-Cox power transform.
//!
//! `lambda = 0` is the natural log, which the Fourier-ARIMA models use for
//! variance stabilisation.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// A Box-Cox transform with a fixed `lambda`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxCox {
    pub lambda: f64,
}

impl BoxCox {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }

    /// The log transform.
    pub fn log() -> Self {
        Self { lambda: 0.0 }
    }

    /// Transform strictly positive data; anything else is rejected.
    pub fn transform(&self, series: &[f64]) -> Result<Vec<f64>> {
        if let Some(bad) = series.iter().find(|x| x.is_nan() || **x <= 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Box-Cox requires positive data, found {bad}"
            )));
        }
        Ok(boxcox(series, self.lambda))
    }

    pub fn inverse(&self, transformed: &[f64]) -> Vec<f64> {
        inv_boxcox(transformed, self.lambda)
    }

    pub fn inverse_one(&self, y: f64) -> f64 {
        inv_one(y, self.lambda)
    }
}

/// Apply Box-Cox with a given `lambda`. Non-positive inputs map to NaN.
pub fn boxcox(series: &[f64], lambda: f64) -> Vec<f64> {
    series
        .iter()
        .map(|&x| {
            if x <= 0.0 {
                f64::NAN
            } else if lambda.abs() < 1e-10 {
                x.ln()
            } else {
                (x.powf(lambda) - 1.0) / lambda
            }
        })
        .collect()
}

/// Inverse Box-Cox.
pub fn inv_boxcox(transformed: &[f64], lambda: f64) -> Vec<f64> {
    transformed.iter().map(|&y| inv_one(y, lambda)).collect()
}

fn inv_one(y: f64, lambda: f64) -> f64 {
    if lambda.abs() < 1e-10 {
        y.exp()
    } else {
        let base = lambda * y + 1.0;
        if base <= 0.0 {
            // below the transform's support
            0.0
        } else {
            base.powf(1.0 / lambda)
        }
    }
}

/// Pick `lambda` in `[lower, upper]` by Guerrero's method.
///
/// The series is cut into non-overlapping blocks of `period` observations
/// and `lambda` minimises the coefficient of variation of
/// `sd(block) / mean(block)^(1 - lambda)`.
pub fn boxcox_lambda(series: &[f64], period: usize, lower: f64, upper: f64) -> f64 {
    let period = period.max(2);
    let blocks: Vec<(f64, f64)> = series
        .chunks_exact(period)
        .filter_map(|block| {
            let m = block.iter().sum::<f64>() / block.len() as f64;
            let var = block.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (block.len() - 1) as f64;
            (m > 0.0 && var > 0.0).then(|| (m, var.sqrt()))
        })
        .collect();
    if blocks.len() < 2 {
        return 1.0_f64.clamp(lower, upper);
    }

    let cv = |lambda: f64| {
        let ratios: Vec<f64> = blocks
            .iter()
            .map(|(m, s)| s / m.powf(1.0 - lambda))
            .collect();
        let k = ratios.len() as f64;
        let mean = ratios.iter().sum::<f64>() / k;
        let sd = (ratios.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (k - 1.0)).sqrt();
        sd / mean
    };

    let steps = 200;
    let mut best = (upper, f64::INFINITY);
    for i in 0..=steps {
        let lambda = lower + (upper - lower) * i as f64 / steps as f64;
        let score = cv(lambda);
        if score < best.1 {
            best = (lambda, score);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn log_is_lambda_zero() {
        let x = [1.0, 2.0, 3.5];
        let y = boxcox(&x, 0.0);
        for (a, b) in x.iter().zip(&y) {
            assert_relative_eq!(a.ln(), *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn inverse_undoes_transform() {
        let x = [0.5, 10.0, 250.0, 4000.0];
        for lambda in [-0.5, 0.0, 0.3, 1.0] {
            let back = inv_boxcox(&boxcox(&x, lambda), lambda);
            for (a, b) in x.iter().zip(&back) {
                assert_relative_eq!(a, b, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn rejects_non_positive_values() {
        assert!(BoxCox::log().transform(&[1.0, 0.0]).is_err());
        assert!(BoxCox::log().transform(&[1.0, f64::NAN]).is_err());
        assert!(boxcox(&[-1.0], 0.5)[0].is_nan());
    }

    #[test]
    fn multiplicative_seasonality_prefers_log() {
        // block sd proportional to block mean
        let series: Vec<f64> = (0..20)
            .flat_map(|b| {
                let level = 10.0 * (1.0 + b as f64);
                (0..7).map(move |d| level * (1.0 + 0.2 * ((d as f64) - 3.0) / 3.0))
            })
            .collect();
        let lambda = boxcox_lambda(&series, 7, -1.0, 2.0);
        assert!(lambda.abs() < 0.05, "lambda = {lambda}");
    }

    #[test]
    fn additive_seasonality_prefers_identity() {
        let series: Vec<f64> = (0..20)
            .flat_map(|b| {
                let level = 100.0 + 10.0 * b as f64;
                (0..7).map(move |d| level + 5.0 * ((d as f64) - 3.0))
            })
            .collect();
        let lambda = boxcox_lambda(&series, 7, -1.0, 2.0);
        assert!((lambda - 1.0).abs() < 0.05, "lambda = {lambda}");
    }
}
