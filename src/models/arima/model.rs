//! Seasonal ARIMA estimated by conditional sum of squares.
//!
//! The model is `phi(B) Phi(B^s) (1-B)^d (1-B^s)^D (y_t - c - b t) = theta(B) Theta(B^s) e_t`,
//! where the constant `c` is only identifiable without differencing and
//! the drift `b` only with at most one difference in total.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::arima::diff::{differencing_polynomial, integrate, multiply};
use crate::models::traits::check_level;
use crate::models::Forecaster;
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use crate::utils::stats::{std_dev, z_for_level};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Orders (p, d, q)(P, D, Q)\[s\].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub cap_p: usize,
    pub cap_d: usize,
    pub cap_q: usize,
    /// Seasonal period; 0 or 1 for a non-seasonal model.
    pub s: usize,
}

impl ModelOrder {
    pub fn arima(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            cap_p: 0,
            cap_d: 0,
            cap_q: 0,
            s: 0,
        }
    }

    pub fn seasonal(
        p: usize,
        d: usize,
        q: usize,
        cap_p: usize,
        cap_d: usize,
        cap_q: usize,
        s: usize,
    ) -> Self {
        Self {
            p,
            d,
            q,
            cap_p,
            cap_d,
            cap_q,
            s,
        }
    }

    pub fn is_seasonal(&self) -> bool {
        self.s > 1 && (self.cap_p > 0 || self.cap_d > 0 || self.cap_q > 0)
    }

    /// `d + D`, counting `D` only for a seasonal model.
    pub fn total_differencing(&self) -> usize {
        self.d + if self.s > 1 { self.cap_d } else { 0 }
    }

    fn period(&self) -> usize {
        if self.s > 1 {
            self.s
        } else {
            0
        }
    }
}

impl fmt::Display for ModelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)?;
        if self.is_seasonal() {
            write!(f, "({},{},{})[{}]", self.cap_p, self.cap_d, self.cap_q, self.s)?;
        }
        Ok(())
    }
}

/// Deterministic part of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Constant {
    #[default]
    None,
    /// Constant mean; undifferenced models only.
    Mean,
    /// Linear drift `b t` (plus a mean when undifferenced).
    Drift,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Estimate {
    ar: Vec<f64>,
    ma: Vec<f64>,
    sar: Vec<f64>,
    sma: Vec<f64>,
    intercept: f64,
    drift: f64,
    sigma2: f64,
    log_likelihood: f64,
    n_eff: usize,
    history: Vec<f64>,
    innovations: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

/// Seasonal ARIMA with optional mean or drift.
///
/// Serializable so a fitted model can be cached on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SARIMA {
    order: ModelOrder,
    constant: Constant,
    estimate: Option<Estimate>,
}

/// Full AR and MA lag coefficients in `x_t = sum a_i x_{t-i} + e_t + sum m_j e_{t-j}` form.
struct Expanded {
    ar: Vec<f64>,
    ma: Vec<f64>,
}

fn expand(order: &ModelOrder, ar: &[f64], ma: &[f64], sar: &[f64], sma: &[f64]) -> Expanded {
    let s = order.period();
    let ar_poly = multiply(&lag_poly(ar, 1, -1.0), &lag_poly(sar, s, -1.0));
    let ma_poly = multiply(&lag_poly(ma, 1, 1.0), &lag_poly(sma, s, 1.0));
    Expanded {
        ar: ar_poly[1..].iter().map(|c| -c).collect(),
        ma: ma_poly[1..].to_vec(),
    }
}

/// `1 + sign * sum c_i B^(i*step)`.
fn lag_poly(coefs: &[f64], step: usize, sign: f64) -> Vec<f64> {
    if coefs.is_empty() || step == 0 {
        return vec![1.0];
    }
    let mut poly = vec![0.0; coefs.len() * step + 1];
    poly[0] = 1.0;
    for (i, c) in coefs.iter().enumerate() {
        poly[(i + 1) * step] = sign * c;
    }
    poly
}

/// Stationarity of `x_t = sum a_i x_{t-i}` by stepping the coefficients
/// down to partial autocorrelations.
pub(crate) fn is_stationary(coefs: &[f64]) -> bool {
    let mut a = coefs.to_vec();
    while let Some(&r) = a.last() {
        if r.abs() >= 1.0 {
            return false;
        }
        let k = a.len() - 1;
        let denom = 1.0 - r * r;
        a = (0..k).map(|i| (a[i] + r * a[k - 1 - i]) / denom).collect();
    }
    true
}

/// Invertibility of `1 + sum m_j B^j`.
pub(crate) fn is_invertible(coefs: &[f64]) -> bool {
    let negated: Vec<f64> = coefs.iter().map(|c| -c).collect();
    is_stationary(&negated)
}

/// One-step innovations of the expanded ARMA over `w`, zero before `start`.
fn innovations(w: &[f64], ex: &Expanded) -> (Vec<f64>, usize) {
    let start = ex.ar.len();
    let mut e = vec![0.0; w.len()];
    for t in start..w.len() {
        let mut pred = 0.0;
        for (i, a) in ex.ar.iter().enumerate() {
            pred += a * w[t - 1 - i];
        }
        for (j, m) in ex.ma.iter().enumerate().take(t) {
            pred += m * e[t - 1 - j];
        }
        e[t] = w[t] - pred;
    }
    (e, start)
}

/// Psi weights of the integrated model, `psi_0 = 1`.
fn psi_weights(ar: &[f64], ma: &[f64], horizon: usize) -> Vec<f64> {
    let mut psi = vec![0.0; horizon];
    if horizon == 0 {
        return psi;
    }
    psi[0] = 1.0;
    for j in 1..horizon {
        let mut v = ma.get(j - 1).copied().unwrap_or(0.0);
        for (i, a) in ar.iter().enumerate().take(j) {
            v += a * psi[j - 1 - i];
        }
        psi[j] = v;
    }
    psi
}

struct Layout {
    p: usize,
    q: usize,
    cap_p: usize,
    cap_q: usize,
    intercept: bool,
    drift: bool,
}

impl Layout {
    fn len(&self) -> usize {
        self.p + self.q + self.cap_p + self.cap_q + self.intercept as usize + self.drift as usize
    }

    /// Split `[ar, ma, sar, sma, intercept?, drift?]`; deterministic terms in data units.
    fn split<'a>(&self, x: &'a [f64], scale: f64) -> (&'a [f64], &'a [f64], &'a [f64], &'a [f64], f64, f64) {
        let (ar, rest) = x.split_at(self.p);
        let (ma, rest) = rest.split_at(self.q);
        let (sar, rest) = rest.split_at(self.cap_p);
        let (sma, rest) = rest.split_at(self.cap_q);
        let mut i = 0;
        let intercept = if self.intercept {
            i += 1;
            rest[0] * scale
        } else {
            0.0
        };
        let drift = if self.drift { rest[i] * scale } else { 0.0 };
        (ar, ma, sar, sma, intercept, drift)
    }
}

impl SARIMA {
    pub fn new(order: ModelOrder, constant: Constant) -> Self {
        Self {
            order,
            constant,
            estimate: None,
        }
    }

    /// Non-seasonal ARIMA(p, d, q) without constant.
    pub fn arima(p: usize, d: usize, q: usize) -> Self {
        Self::new(ModelOrder::arima(p, d, q), Constant::None)
    }

    pub fn order(&self) -> ModelOrder {
        self.order
    }

    pub fn constant(&self) -> Constant {
        self.constant
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        self.estimate.as_ref().map_or(&[], |e| e.ar.as_slice())
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        self.estimate.as_ref().map_or(&[], |e| e.ma.as_slice())
    }

    pub fn seasonal_ar_coefficients(&self) -> &[f64] {
        self.estimate.as_ref().map_or(&[], |e| e.sar.as_slice())
    }

    pub fn seasonal_ma_coefficients(&self) -> &[f64] {
        self.estimate.as_ref().map_or(&[], |e| e.sma.as_slice())
    }

    pub fn intercept(&self) -> Option<f64> {
        self.estimate.as_ref().map(|e| e.intercept)
    }

    /// Estimated slope per day; zero unless fitted with [`Constant::Drift`].
    pub fn drift(&self) -> Option<f64> {
        self.estimate.as_ref().map(|e| e.drift)
    }

    pub fn sigma2(&self) -> Option<f64> {
        self.estimate.as_ref().map(|e| e.sigma2)
    }

    pub fn log_likelihood(&self) -> Option<f64> {
        self.estimate.as_ref().map(|e| e.log_likelihood)
    }

    /// Estimated parameters including the innovation variance.
    pub fn num_params(&self) -> usize {
        self.layout().len() + 1
    }

    pub fn aic(&self) -> Option<f64> {
        let k = self.num_params() as f64;
        self.log_likelihood().map(|ll| -2.0 * ll + 2.0 * k)
    }

    pub fn aicc(&self) -> Option<f64> {
        let est = self.estimate.as_ref()?;
        let k = self.num_params() as f64;
        let n = est.n_eff as f64;
        if n - k - 1.0 <= 0.0 {
            return None;
        }
        self.aic().map(|aic| aic + 2.0 * k * (k + 1.0) / (n - k - 1.0))
    }

    pub fn bic(&self) -> Option<f64> {
        let est = self.estimate.as_ref()?;
        let k = self.num_params() as f64;
        Some(-2.0 * est.log_likelihood + k * (est.n_eff as f64).ln())
    }

    fn layout(&self) -> Layout {
        let seasonal = self.order.s > 1;
        let undifferenced = self.order.total_differencing() == 0;
        Layout {
            p: self.order.p,
            q: self.order.q,
            cap_p: if seasonal { self.order.cap_p } else { 0 },
            cap_q: if seasonal { self.order.cap_q } else { 0 },
            intercept: undifferenced && self.constant != Constant::None,
            drift: self.constant == Constant::Drift,
        }
    }

    fn validate(&self) -> Result<()> {
        let o = &self.order;
        if o.s < 2 && (o.cap_p > 0 || o.cap_d > 0 || o.cap_q > 0) {
            return Err(ForecastError::InvalidParameter(format!(
                "{o}: seasonal orders need a period of at least 2"
            )));
        }
        match self.constant {
            Constant::Mean if o.total_differencing() > 0 => Err(ForecastError::InvalidParameter(
                format!("{o}: a mean is not identifiable after differencing"),
            )),
            Constant::Drift if o.total_differencing() > 1 => Err(ForecastError::InvalidParameter(
                format!("{o}: drift needs d + D <= 1"),
            )),
            _ => Ok(()),
        }
    }

    fn fitted_state(&self) -> Result<&Estimate> {
        self.estimate.as_ref().ok_or(ForecastError::FitRequired)
    }
}

impl Default for SARIMA {
    fn default() -> Self {
        Self::arima(1, 1, 1)
    }
}

impl Forecaster for SARIMA {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        self.validate()?;
        let y = series.values();
        let n = y.len();
        let layout = self.layout();
        let period = self.order.period();
        let poly = differencing_polynomial(self.order.d, self.order.cap_d, period);
        let lag = poly.len() - 1;
        let ar_len = self.order.p + layout.cap_p * period;
        let needed = lag + ar_len + layout.len() + 3;
        if n < needed {
            return Err(ForecastError::InsufficientData { needed, got: n });
        }

        // differenced response and differenced time index, computed once
        let difference = |x: &[f64]| -> Vec<f64> {
            (lag..x.len())
                .map(|t| poly.iter().enumerate().map(|(i, c)| c * x[t - i]).sum())
                .collect()
        };
        let time: Vec<f64> = (1..=n).map(|t| t as f64).collect();
        let wy = difference(y);
        let wt = difference(&time);

        let scale = {
            let s = std_dev(&wy);
            if s.is_finite() && s > 0.0 {
                s
            } else {
                1.0
            }
        };

        // deterministic starting values
        let (intercept0, drift0) = if lag == 0 {
            let tm = (n as f64 + 1.0) / 2.0;
            let ym = y.iter().sum::<f64>() / n as f64;
            let sxx: f64 = time.iter().map(|t| (t - tm).powi(2)).sum();
            let sxy: f64 = time.iter().zip(y).map(|(t, v)| (t - tm) * (v - ym)).sum();
            let b = if layout.drift { sxy / sxx } else { 0.0 };
            (ym - b * tm, b)
        } else {
            let wt_mean = wt.iter().sum::<f64>() / wt.len() as f64;
            let wy_mean = wy.iter().sum::<f64>() / wy.len() as f64;
            let b = if wt_mean.abs() > 0.0 { wy_mean / wt_mean } else { 0.0 };
            (0.0, b)
        };

        let mut start = vec![0.0; layout.len()];
        let mut bounds = vec![(-0.99, 0.99); layout.len()];
        let mut i = layout.p + layout.q + layout.cap_p + layout.cap_q;
        if layout.intercept {
            start[i] = intercept0 / scale;
            bounds[i] = (f64::NEG_INFINITY, f64::INFINITY);
            i += 1;
        }
        if layout.drift {
            start[i] = drift0 / scale;
            bounds[i] = (f64::NEG_INFINITY, f64::INFINITY);
        }

        let order = self.order;
        let residual_series = |x: &[f64]| {
            let (ar, ma, sar, sma, c, b) = layout.split(x, scale);
            let ex = expand(&order, ar, ma, sar, sma);
            let w: Vec<f64> = wy
                .iter()
                .zip(&wt)
                .map(|(v, t)| v - b * t - if lag == 0 { c } else { 0.0 })
                .collect();
            let (e, from) = innovations(&w, &ex);
            (w, e, from, ex)
        };
        let objective = |x: &[f64]| {
            let (ar, ma, sar, sma, _, _) = layout.split(x, scale);
            if !(is_stationary(ar) && is_stationary(sar) && is_invertible(ma) && is_invertible(sma)) {
                return f64::INFINITY;
            }
            let (_, e, from, _) = residual_series(x);
            let css: f64 = e[from..].iter().map(|v| v * v).sum();
            css / (scale * scale)
        };

        let point = if layout.len() == 0 {
            Vec::new()
        } else {
            // one restart from the first optimum
            let config = NelderMeadConfig::default().with_max_iter(400 * layout.len());
            let first = nelder_mead(&objective, &start, Some(&bounds), config.clone());
            let second = nelder_mead(&objective, &first.optimal_point, Some(&bounds), config);
            if !second.optimal_value.is_finite() {
                return Err(ForecastError::ComputationError(format!(
                    "{} sum of squares did not converge",
                    self.order
                )));
            }
            second.optimal_point
        };

        let (w, e, from, _) = residual_series(&point);
        let n_eff = w.len() - from;
        let css: f64 = e[from..].iter().map(|v| v * v).sum();
        let sigma2 = (css / n_eff as f64).max(1e-300);
        let log_likelihood = -0.5 * n_eff as f64 * ((2.0 * PI * sigma2).ln() + 1.0);

        let offset = lag;
        let mut fitted = vec![f64::NAN; n];
        let mut residuals = vec![f64::NAN; n];
        for t in from..w.len() {
            residuals[t + offset] = e[t];
            fitted[t + offset] = y[t + offset] - e[t];
        }

        let (ar, ma, sar, sma, intercept, drift) = layout.split(&point, scale);
        self.estimate = Some(Estimate {
            ar: ar.to_vec(),
            ma: ma.to_vec(),
            sar: sar.to_vec(),
            sma: sma.to_vec(),
            intercept,
            drift,
            sigma2,
            log_likelihood,
            n_eff,
            history: y.to_vec(),
            innovations: e,
            fitted,
            residuals,
        });
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let est = self.fitted_state()?;
        let n = est.history.len();
        let period = self.order.period();
        let poly = differencing_polynomial(self.order.d, self.order.cap_d, period);
        let lag = poly.len() - 1;
        let ex = expand(&self.order, &est.ar, &est.ma, &est.sar, &est.sma);

        let deterministic = |t: usize| est.intercept + est.drift * t as f64;
        let x: Vec<f64> = est
            .history
            .iter()
            .enumerate()
            .map(|(i, v)| v - deterministic(i + 1))
            .collect();
        let mut w: Vec<f64> = (lag..n)
            .map(|t| poly.iter().enumerate().map(|(i, c)| c * x[t - i]).sum())
            .collect();
        let mut e = est.innovations.clone();
        let observed = w.len();

        for _ in 0..horizon {
            let t = w.len();
            let mut pred = 0.0;
            for (i, a) in ex.ar.iter().enumerate().take(t) {
                pred += a * w[t - 1 - i];
            }
            for (j, m) in ex.ma.iter().enumerate().take(t) {
                pred += m * e[t - 1 - j];
            }
            w.push(pred);
            e.push(0.0);
        }

        let future_x = integrate(&w[observed..], &x, &poly);
        let point = future_x
            .iter()
            .enumerate()
            .map(|(h, v)| v + deterministic(n + h + 1))
            .collect();
        Ok(Forecast::from_values(point))
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        check_level(level)?;
        let est = self.fitted_state()?;
        let point = self.predict(horizon)?.into_point();

        let period = self.order.period();
        let ex = expand(&self.order, &est.ar, &est.ma, &est.sar, &est.sma);
        let poly = differencing_polynomial(self.order.d, self.order.cap_d, period);
        let mut ar_poly = vec![1.0];
        ar_poly.extend(ex.ar.iter().map(|a| -a));
        let integrated: Vec<f64> = multiply(&ar_poly, &poly)[1..].iter().map(|c| -c).collect();
        let psi = psi_weights(&integrated, &ex.ma, horizon);

        let z = z_for_level(level);
        let mut acc = 0.0;
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for (p, w) in point.iter().zip(&psi) {
            acc += w * w;
            let sd = (est.sigma2 * acc).sqrt();
            lower.push(p - z * sd);
            upper.push(p + z * sd);
        }
        Forecast::from_values_with_intervals(point, lower, upper)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.estimate.as_ref().map(|e| e.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.estimate.as_ref().map(|e| e.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "SARIMA"
    }
}
