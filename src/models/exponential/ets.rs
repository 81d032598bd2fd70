//! Non-seasonal ETS state-space models.
//!
//! Covers the error/trend combinations used on seasonally adjusted data:
//! additive or multiplicative errors with no, additive or damped trend.
//! Smoothing parameters and the initial states are estimated jointly by
//! maximum likelihood.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::traits::check_level;
use crate::models::Forecaster;
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use crate::utils::stats::z_for_level;
use std::f64::consts::PI;

/// Error component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorType {
    #[default]
    Additive,
    Multiplicative,
}

/// Trend component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendType {
    #[default]
    None,
    Additive,
    AdditiveDamped,
}

/// Error and trend of a non-seasonal ETS model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ETSSpec {
    pub error: ErrorType,
    pub trend: TrendType,
}

impl ETSSpec {
    pub fn new(error: ErrorType, trend: TrendType) -> Self {
        Self { error, trend }
    }

    /// Simple exponential smoothing, ETS(A,N,N).
    pub fn ann() -> Self {
        Self::new(ErrorType::Additive, TrendType::None)
    }

    /// Holt's linear method, ETS(A,A,N).
    pub fn aan() -> Self {
        Self::new(ErrorType::Additive, TrendType::Additive)
    }

    /// Damped trend, ETS(A,Ad,N).
    pub fn aadn() -> Self {
        Self::new(ErrorType::Additive, TrendType::AdditiveDamped)
    }

    /// Short name such as `ETS(M,Ad,N)`.
    pub fn short_name(&self) -> String {
        let e = match self.error {
            ErrorType::Additive => "A",
            ErrorType::Multiplicative => "M",
        };
        let t = match self.trend {
            TrendType::None => "N",
            TrendType::Additive => "A",
            TrendType::AdditiveDamped => "Ad",
        };
        format!("ETS({e},{t},N)")
    }

    pub fn has_trend(&self) -> bool {
        !matches!(self.trend, TrendType::None)
    }

    pub fn is_damped(&self) -> bool {
        matches!(self.trend, TrendType::AdditiveDamped)
    }

    /// Smoothing and initial-state parameter count (plus the variance).
    fn num_params(&self) -> usize {
        let smoothing = 1 + usize::from(self.has_trend()) + usize::from(self.is_damped());
        let states = 1 + usize::from(self.has_trend());
        smoothing + states + 1
    }
}

/// Estimated parameters and final state.
#[derive(Debug, Clone, Copy)]
struct Estimate {
    alpha: f64,
    beta: f64,
    phi: f64,
    level: f64,
    trend: f64,
}

/// ETS model with estimated parameters.
#[derive(Debug, Clone)]
pub struct ETS {
    spec: ETSSpec,
    estimate: Option<Estimate>,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
    sigma2: f64,
    log_likelihood: f64,
    n: usize,
}

struct Pass {
    neg2ll: f64,
    fitted: Vec<f64>,
    innovations: Vec<f64>,
    level: f64,
    trend: f64,
}

impl ETS {
    pub fn new(spec: ETSSpec) -> Self {
        Self {
            spec,
            estimate: None,
            fitted: None,
            residuals: None,
            sigma2: f64::NAN,
            log_likelihood: f64::NAN,
            n: 0,
        }
    }

    pub fn spec(&self) -> ETSSpec {
        self.spec
    }

    pub fn alpha(&self) -> Option<f64> {
        self.estimate.map(|e| e.alpha)
    }

    pub fn beta(&self) -> Option<f64> {
        self.estimate
            .filter(|_| self.spec.has_trend())
            .map(|e| e.beta)
    }

    pub fn phi(&self) -> Option<f64> {
        self.estimate
            .filter(|_| self.spec.is_damped())
            .map(|e| e.phi)
    }

    pub fn log_likelihood(&self) -> Option<f64> {
        self.estimate.map(|_| self.log_likelihood)
    }

    pub fn aic(&self) -> Option<f64> {
        let k = self.spec.num_params() as f64;
        self.log_likelihood().map(|ll| -2.0 * ll + 2.0 * k)
    }

    pub fn aicc(&self) -> Option<f64> {
        let k = self.spec.num_params() as f64;
        let n = self.n as f64;
        if n - k - 1.0 <= 0.0 {
            return None;
        }
        self.aic().map(|aic| aic + 2.0 * k * (k + 1.0) / (n - k - 1.0))
    }

    pub fn bic(&self) -> Option<f64> {
        let k = self.spec.num_params() as f64;
        let n = self.n as f64;
        self.log_likelihood().map(|ll| -2.0 * ll + k * n.ln())
    }

    /// Run the state recursion once. `-2 log L` up to the fitted states.
    fn filter(&self, y: &[f64], alpha: f64, beta: f64, phi: f64, l0: f64, b0: f64) -> Pass {
        let n = y.len();
        let mut level = l0;
        let mut trend = b0;
        let mut fitted = Vec::with_capacity(n);
        let mut innovations = Vec::with_capacity(n);
        let mut sum_sq = 0.0;
        let mut sum_log = 0.0;
        let damp = if self.spec.has_trend() { phi } else { 0.0 };

        for &obs in y {
            let base = level + damp * trend;
            fitted.push(base);
            match self.spec.error {
                ErrorType::Additive => {
                    let e = obs - base;
                    level = base + alpha * e;
                    trend = damp * trend + beta * e;
                    sum_sq += e * e;
                    innovations.push(e);
                }
                ErrorType::Multiplicative => {
                    if base <= 0.0 {
                        return Pass {
                            neg2ll: f64::INFINITY,
                            fitted,
                            innovations,
                            level,
                            trend,
                        };
                    }
                    let e = (obs - base) / base;
                    level = base * (1.0 + alpha * e);
                    trend = damp * trend + beta * base * e;
                    sum_sq += e * e;
                    sum_log += base.abs().ln();
                    innovations.push(e);
                }
            }
            if !self.spec.has_trend() {
                trend = 0.0;
            }
        }

        let nf = n as f64;
        let sigma2 = (sum_sq / nf).max(1e-300);
        let neg2ll = nf * (sigma2.ln() + 1.0 + (2.0 * PI).ln()) + 2.0 * sum_log;
        Pass {
            neg2ll,
            fitted,
            innovations,
            level,
            trend,
        }
    }

    /// Unpack the optimiser vector `[alpha, beta/alpha, phi, l0, b0]`
    /// (trend entries present only when the spec has them).
    fn unpack(&self, p: &[f64], scale: f64) -> (f64, f64, f64, f64, f64) {
        let alpha = p[0];
        let mut i = 1;
        let mut beta = 0.0;
        let mut phi = 1.0;
        if self.spec.has_trend() {
            beta = p[i] * alpha;
            i += 1;
        }
        if self.spec.is_damped() {
            phi = p[i];
            i += 1;
        }
        let l0 = p[i] * scale;
        let b0 = if self.spec.has_trend() {
            p[i + 1] * scale
        } else {
            0.0
        };
        (alpha, beta, phi, l0, b0)
    }
}

impl Default for ETS {
    fn default() -> Self {
        Self::new(ETSSpec::ann())
    }
}

impl Forecaster for ETS {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let y = series.values();
        let min_len = 4 + self.spec.num_params();
        if y.len() < min_len {
            return Err(ForecastError::InsufficientData {
                needed: min_len,
                got: y.len(),
            });
        }
        if self.spec.error == ErrorType::Multiplicative && y.iter().any(|v| *v <= 0.0) {
            return Err(ForecastError::InvalidParameter(
                "multiplicative errors need positive data".into(),
            ));
        }

        // initial states are optimised in units of the data scale
        let scale = y.iter().map(|v| v.abs()).sum::<f64>() / y.len() as f64;
        let scale = if scale > 0.0 { scale } else { 1.0 };
        let head = &y[..y.len().min(10)];
        let b_init = if self.spec.has_trend() && head.len() > 1 {
            (head[head.len() - 1] - head[0]) / (head.len() - 1) as f64
        } else {
            0.0
        };
        let l_init = if self.spec.has_trend() {
            head[0] - b_init
        } else {
            head.iter().sum::<f64>() / head.len() as f64
        };

        let mut start = vec![0.3];
        let mut bounds = vec![(1e-4, 0.9999)];
        if self.spec.has_trend() {
            start.push(0.1);
            bounds.push((1e-4, 0.9999));
        }
        if self.spec.is_damped() {
            start.push(0.95);
            bounds.push((0.8, 0.98));
        }
        start.push(l_init / scale);
        bounds.push((f64::NEG_INFINITY, f64::INFINITY));
        if self.spec.has_trend() {
            start.push(b_init / scale);
            bounds.push((f64::NEG_INFINITY, f64::INFINITY));
        }

        let objective = |p: &[f64]| {
            let (alpha, beta, phi, l0, b0) = self.unpack(p, scale);
            self.filter(y, alpha, beta, phi, l0, b0).neg2ll
        };
        let result = nelder_mead(
            objective,
            &start,
            Some(&bounds),
            NelderMeadConfig::default().with_max_iter(2000),
        );
        if !result.optimal_value.is_finite() {
            return Err(ForecastError::ComputationError(format!(
                "{} likelihood did not converge",
                self.spec.short_name()
            )));
        }

        let (alpha, beta, phi, l0, b0) = self.unpack(&result.optimal_point, scale);
        let pass = self.filter(y, alpha, beta, phi, l0, b0);
        let n = y.len() as f64;
        self.sigma2 = pass.innovations.iter().map(|e| e * e).sum::<f64>() / n;
        self.log_likelihood = -0.5 * pass.neg2ll;
        self.n = y.len();
        self.residuals = Some(y.iter().zip(&pass.fitted).map(|(a, f)| a - f).collect());
        self.fitted = Some(pass.fitted);
        self.estimate = Some(Estimate {
            alpha,
            beta,
            phi,
            level: pass.level,
            trend: pass.trend,
        });
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let est = self.estimate.ok_or(ForecastError::FitRequired)?;
        let mut damp_sum = 0.0;
        let point = (1..=horizon)
            .map(|h| {
                damp_sum += if self.spec.has_trend() {
                    est.phi.powi(h as i32)
                } else {
                    0.0
                };
                est.level + damp_sum * est.trend
            })
            .collect();
        Ok(Forecast::from_values(point))
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        check_level(level)?;
        let est = self.estimate.ok_or(ForecastError::FitRequired)?;
        let point = self.predict(horizon)?.into_point();
        let z = z_for_level(level);

        // variance multiplier 1 + sum_{j<h} c_j^2 with c_j = alpha + beta * phi_j
        let mut acc = 0.0;
        let mut phi_j = 0.0;
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for (h, p) in point.iter().enumerate() {
            if h > 0 {
                if self.spec.has_trend() {
                    phi_j += est.phi.powi(h as i32);
                }
                let c = est.alpha + est.beta * phi_j;
                acc += c * c;
            }
            let var = self.sigma2 * (1.0 + acc);
            let sd = match self.spec.error {
                ErrorType::Additive => var.sqrt(),
                ErrorType::Multiplicative => p.abs() * var.sqrt(),
            };
            lower.push(p - z * sd);
            upper.push(p + z * sd);
        }
        Forecast::from_values_with_intervals(point, lower, upper)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        "ETS"
    }
}
