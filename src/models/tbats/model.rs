//! TBATS state-space model with fixed structure.
//!
//! State vector: `[level, trend?, (s_j, s*_j) per harmonic]`. With
//! `d_t` the ARMA error and `e_t` the white-noise innovation,
//!
//! ```text
//! y_t   = l_{t-1} + phi b_{t-1} + sum_j s_{j,t-1} + d_t
//! l_t   = l_{t-1} + phi b_{t-1} + alpha d_t
//! b_t   = phi b_{t-1} + beta d_t
//! s_j   = cos(w_j) s_j + sin(w_j) s*_j + gamma1_i d_t
//! s*_j  = -sin(w_j) s_j + cos(w_j) s*_j + gamma2_i d_t
//! d_t   = sum ar_k d_{t-k} + sum ma_k e_{t-k} + e_t
//! ```
//!
//! where `w_j = 2 pi k / m_i` for harmonic `k` of period `m_i`. Periods may
//! be non-integer. `y` is on the Box-Cox scale when a lambda is set.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::arima::{is_invertible, is_stationary};
use crate::models::traits::check_level;
use crate::models::Forecaster;
use crate::transform::BoxCox;
use crate::utils::ols::{ols_fit, Regressors};
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use crate::utils::stats::z_for_level;
use std::f64::consts::PI;
use tracing::debug;

/// Filter state: state vector plus the ARMA memory, most recent first.
#[derive(Debug, Clone)]
struct State {
    x: Vec<f64>,
    d: Vec<f64>,
    e: Vec<f64>,
}

impl State {
    fn zeros(width: usize, p: usize, q: usize) -> Self {
        Self {
            x: vec![0.0; width],
            d: vec![0.0; p],
            e: vec![0.0; q],
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn push_front(buf: &mut [f64], v: f64) {
    if !buf.is_empty() {
        buf.rotate_right(1);
        buf[0] = v;
    }
}

/// Transition and observation for one parameter vector.
#[derive(Debug, Clone)]
struct Dynamics {
    trend: bool,
    alpha: f64,
    beta: f64,
    phi: f64,
    /// `(cos w_j, sin w_j)` per harmonic.
    rotation: Vec<(f64, f64)>,
    /// `(gamma1, gamma2)` per harmonic, shared within a period.
    gains: Vec<(f64, f64)>,
    ar: Vec<f64>,
    ma: Vec<f64>,
}

impl Dynamics {
    fn seasonal_offset(&self) -> usize {
        if self.trend {
            2
        } else {
            1
        }
    }

    fn width(&self) -> usize {
        self.seasonal_offset() + 2 * self.rotation.len()
    }

    fn predict(&self, s: &State) -> f64 {
        let mut y = s.x[0];
        if self.trend {
            y += self.phi * s.x[1];
        }
        let off = self.seasonal_offset();
        for j in 0..self.rotation.len() {
            y += s.x[off + 2 * j];
        }
        y + dot(&self.ar, &s.d) + dot(&self.ma, &s.e)
    }

    fn update(&self, s: &mut State, e: f64) {
        let d = dot(&self.ar, &s.d) + dot(&self.ma, &s.e) + e;
        if self.trend {
            let b = s.x[1];
            s.x[0] += self.phi * b + self.alpha * d;
            s.x[1] = self.phi * b + self.beta * d;
        } else {
            s.x[0] += self.alpha * d;
        }
        let off = self.seasonal_offset();
        for (j, (&(c, sn), &(g1, g2))) in self.rotation.iter().zip(&self.gains).enumerate() {
            let i = off + 2 * j;
            let (a, b) = (s.x[i], s.x[i + 1]);
            s.x[i] = c * a + sn * b + g1 * d;
            s.x[i + 1] = -sn * a + c * b + g2 * d;
        }
        push_front(&mut s.d, d);
        push_front(&mut s.e, e);
    }

    /// Run the filter over `y`. Returns the sum of squared innovations
    /// (infinite once the filter diverges), the final state and the
    /// one-step predictions.
    fn filter(&self, seed: &State, y: &[f64]) -> (f64, State, Vec<f64>) {
        let mut s = seed.clone();
        let mut sse = 0.0;
        let mut fitted = Vec::with_capacity(y.len());
        for &obs in y {
            let yhat = self.predict(&s);
            let e = obs - yhat;
            sse += e * e;
            if !sse.is_finite() {
                return (f64::INFINITY, s, fitted);
            }
            fitted.push(yhat);
            self.update(&mut s, e);
        }
        (sse, s, fitted)
    }

    /// Effect of a unit innovation on the next `horizon - 1` observations.
    fn impulse_response(&self, horizon: usize) -> Vec<f64> {
        let mut s = State::zeros(self.width(), self.ar.len(), self.ma.len());
        self.update(&mut s, 1.0);
        (1..horizon)
            .map(|_| {
                let v = self.predict(&s);
                self.update(&mut s, 0.0);
                v
            })
            .collect()
    }
}

/// Free-parameter vector layout:
/// `[alpha, beta?, phi?, gamma1.., gamma2.., ar.., ma..]`.
#[derive(Debug, Clone, Copy)]
struct Layout {
    trend: bool,
    damped: bool,
    periods: usize,
    p: usize,
    q: usize,
}

impl Layout {
    fn len(&self) -> usize {
        1 + self.trend as usize + self.damped as usize + 2 * self.periods + self.p + self.q
    }

    fn initial(&self) -> Vec<f64> {
        let mut x = vec![0.09];
        if self.trend {
            x.push(0.05);
        }
        if self.damped {
            x.push(0.97);
        }
        x.extend(std::iter::repeat(0.001).take(2 * self.periods));
        x.extend(std::iter::repeat(0.0).take(self.p + self.q));
        x
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        let mut b = vec![(1e-4, 0.9999)];
        if self.trend {
            b.push((1e-4, 0.5));
        }
        if self.damped {
            b.push((0.8, 0.999));
        }
        b.extend(std::iter::repeat((-0.1, 0.1)).take(2 * self.periods));
        b.extend(std::iter::repeat((-0.99, 0.99)).take(self.p + self.q));
        b
    }

    fn dynamics(&self, x: &[f64], rotation: &[(f64, f64)], owners: &[usize]) -> Dynamics {
        let mut i = 0;
        let mut next = || {
            let v = x[i];
            i += 1;
            v
        };
        let alpha = next();
        let beta = if self.trend { next() } else { 0.0 };
        let phi = if self.damped { next() } else { 1.0 };
        let gamma1: Vec<f64> = (0..self.periods).map(|_| next()).collect();
        let gamma2: Vec<f64> = (0..self.periods).map(|_| next()).collect();
        let ar: Vec<f64> = (0..self.p).map(|_| next()).collect();
        let ma: Vec<f64> = (0..self.q).map(|_| next()).collect();
        Dynamics {
            trend: self.trend,
            alpha,
            beta,
            phi,
            rotation: rotation.to_vec(),
            gains: owners.iter().map(|&o| (gamma1[o], gamma2[o])).collect(),
            ar,
            ma,
        }
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    dynamics: Dynamics,
    last: State,
    sigma2: f64,
    aic: f64,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

/// TBATS with a fixed structure: seasonal periods, harmonic counts,
/// Box-Cox lambda, trend/damping and ARMA orders are chosen up front.
/// [`AutoTBATS`](super::AutoTBATS) searches over these.
#[derive(Debug, Clone)]
pub struct TBATS {
    periods: Vec<f64>,
    harmonics: Vec<usize>,
    lambda: Option<f64>,
    trend: bool,
    damped: bool,
    arma: (usize, usize),
    state: Option<Fitted>,
}

impl TBATS {
    /// Trend, no Box-Cox, no ARMA errors, up to two harmonics per period.
    pub fn new(periods: Vec<f64>) -> Self {
        let harmonics = periods.iter().map(|&m| max_harmonics(m).min(2)).collect();
        Self {
            periods,
            harmonics,
            lambda: None,
            trend: true,
            damped: false,
            arma: (0, 0),
            state: None,
        }
    }

    pub fn with_harmonics(mut self, harmonics: Vec<usize>) -> Self {
        self.harmonics = harmonics;
        self
    }

    pub fn with_box_cox(mut self, lambda: f64) -> Self {
        self.lambda = Some(lambda);
        self
    }

    pub fn without_trend(mut self) -> Self {
        self.trend = false;
        self.damped = false;
        self
    }

    /// Damped trend; implies a trend.
    pub fn with_damped_trend(mut self) -> Self {
        self.trend = true;
        self.damped = true;
        self
    }

    pub fn with_arma(mut self, p: usize, q: usize) -> Self {
        self.arma = (p, q);
        self
    }

    pub fn seasonal_periods(&self) -> &[f64] {
        &self.periods
    }

    pub fn harmonics(&self) -> &[usize] {
        &self.harmonics
    }

    pub fn lambda(&self) -> Option<f64> {
        self.lambda
    }

    pub fn has_trend(&self) -> bool {
        self.trend
    }

    pub fn is_damped(&self) -> bool {
        self.damped
    }

    pub fn arma_order(&self) -> (usize, usize) {
        self.arma
    }

    /// Information criterion of the last fit, including the Box-Cox Jacobian.
    pub fn aic(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.aic)
    }

    /// Innovation variance on the transformed scale.
    pub fn sigma2(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.sigma2)
    }

    /// Estimated damping parameter, 1 for an undamped trend.
    pub fn phi(&self) -> Option<f64> {
        self.state
            .as_ref()
            .filter(|s| s.dynamics.trend)
            .map(|s| s.dynamics.phi)
    }

    /// Conventional `TBATS(lambda, {p,q}, phi, {<m,k>,...})` label.
    pub fn describe(&self) -> String {
        let lambda = self
            .lambda
            .map_or_else(|| "1".to_string(), |l| format!("{l:.3}"));
        let phi = match (self.damped, self.phi()) {
            (true, Some(phi)) => format!("{phi:.3}"),
            (true, None) => "damped".to_string(),
            (false, _) => "-".to_string(),
        };
        let seasons: Vec<String> = self
            .periods
            .iter()
            .zip(&self.harmonics)
            .map(|(m, k)| format!("<{m},{k}>"))
            .collect();
        format!(
            "TBATS({lambda}, {{{},{}}}, {phi}, {{{}}})",
            self.arma.0,
            self.arma.1,
            seasons.join(", ")
        )
    }

    fn validate(&self) -> Result<()> {
        if self.periods.len() != self.harmonics.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.periods.len(),
                got: self.harmonics.len(),
            });
        }
        for (&m, &k) in self.periods.iter().zip(&self.harmonics) {
            if !(m.is_finite() && m > 2.0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "seasonal period must exceed 2, got {m}"
                )));
            }
            if k == 0 || k > max_harmonics(m) {
                return Err(ForecastError::InvalidParameter(format!(
                    "harmonic count {k} out of range for period {m}"
                )));
            }
        }
        if self.arma.0 > 5 || self.arma.1 > 5 {
            return Err(ForecastError::InvalidParameter(
                "ARMA orders above 5 are not supported".into(),
            ));
        }
        Ok(())
    }

    /// `(owning period, angular frequency)` per harmonic.
    fn frequencies(&self) -> Vec<(usize, f64)> {
        self.periods
            .iter()
            .zip(&self.harmonics)
            .enumerate()
            .flat_map(|(i, (&m, &kmax))| (1..=kmax).map(move |k| (i, 2.0 * PI * k as f64 / m)))
            .collect()
    }

    fn layout(&self) -> Layout {
        Layout {
            trend: self.trend,
            damped: self.damped,
            periods: self.periods.len(),
            p: self.arma.0,
            q: self.arma.1,
        }
    }

    /// Initial states from a regression of the first seasonal cycles on a
    /// linear time index and the harmonic pairs.
    fn seed_state(&self, y: &[f64], omegas: &[f64]) -> Result<State> {
        let n = y.len();
        let longest = self.periods.iter().cloned().fold(0.0_f64, f64::max);
        let columns = self.trend as usize + 2 * omegas.len();
        let head = ((2.0 * longest).ceil() as usize)
            .max(20)
            .max(columns + 10)
            .min(n);

        let mut x = Regressors::with_rows(head);
        if self.trend {
            x.push("trend", (1..=head).map(|t| t as f64).collect())?;
        }
        for (j, &w) in omegas.iter().enumerate() {
            x.push(format!("cos{j}"), (0..head).map(|t| (w * t as f64).cos()).collect())?;
            x.push(format!("sin{j}"), (0..head).map(|t| (w * t as f64).sin()).collect())?;
        }
        let reg = ols_fit(&y[..head], &x)?;

        let offset = if self.trend { 2 } else { 1 };
        let mut state = State::zeros(offset + 2 * omegas.len(), self.arma.0, self.arma.1);
        state.x[0] = reg.intercept;
        if self.trend {
            state.x[1] = reg.coefficients[0];
        }
        let seasonal = &reg.coefficients[self.trend as usize..];
        state.x[offset..].copy_from_slice(seasonal);
        Ok(state)
    }

    fn back(&self, v: f64) -> f64 {
        match self.lambda {
            Some(l) => BoxCox::new(l).inverse_one(v),
            None => v,
        }
    }

    fn point_path(&self, state: &Fitted, horizon: usize) -> Vec<f64> {
        let mut s = state.last.clone();
        (0..horizon)
            .map(|_| {
                let v = state.dynamics.predict(&s);
                state.dynamics.update(&mut s, 0.0);
                v
            })
            .collect()
    }
}

/// Largest usable harmonic count: `2k < m`.
pub(crate) fn max_harmonics(period: f64) -> usize {
    let k = ((period - 1.0) / 2.0).floor();
    if k < 1.0 {
        0
    } else {
        k as usize
    }
}

impl Forecaster for TBATS {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        self.validate()?;
        let layout = self.layout();
        let freqs = self.frequencies();
        let seed_len = 1 + self.trend as usize + 2 * freqs.len();
        let needed = (layout.len() + seed_len + 5).max(10);
        let n = series.len();
        if n < needed {
            return Err(ForecastError::InsufficientData { needed, got: n });
        }

        let y = match self.lambda {
            Some(l) => BoxCox::new(l).transform(series.values())?,
            None => series.values().to_vec(),
        };
        let omegas: Vec<f64> = freqs.iter().map(|(_, w)| *w).collect();
        let owners: Vec<usize> = freqs.iter().map(|(o, _)| *o).collect();
        let rotation: Vec<(f64, f64)> = omegas.iter().map(|w| (w.cos(), w.sin())).collect();
        let seed = self.seed_state(&y, &omegas)?;

        let nf = n as f64;
        let objective = |x: &[f64]| {
            let dynamics = layout.dynamics(x, &rotation, &owners);
            if !is_stationary(&dynamics.ar) || !is_invertible(&dynamics.ma) {
                return f64::INFINITY;
            }
            let (sse, _, _) = dynamics.filter(&seed, &y);
            nf * (sse / nf).max(f64::MIN_POSITIVE).ln()
        };
        let bounds = layout.bounds();
        let config = NelderMeadConfig::default().with_max_iter(200 * layout.len());
        let first = nelder_mead(&objective, &layout.initial(), Some(&bounds), config.clone());
        let best = nelder_mead(&objective, &first.optimal_point, Some(&bounds), config);
        if !best.optimal_value.is_finite() {
            return Err(ForecastError::ComputationError(
                "TBATS filter diverged for every parameter tried".into(),
            ));
        }

        let dynamics = layout.dynamics(&best.optimal_point, &rotation, &owners);
        let (sse, last, fitted_t) = dynamics.filter(&seed, &y);
        let sigma2 = sse / nf;
        let k = (layout.len() + seed_len + self.lambda.is_some() as usize) as f64;
        let jacobian = match self.lambda {
            Some(l) => -2.0 * (l - 1.0) * series.values().iter().map(|v| v.ln()).sum::<f64>(),
            None => 0.0,
        };
        let aic = nf * sigma2.max(f64::MIN_POSITIVE).ln() + jacobian + 2.0 * k;
        let fitted: Vec<f64> = fitted_t.iter().map(|&v| self.back(v)).collect();
        let residuals = series
            .values()
            .iter()
            .zip(&fitted)
            .map(|(a, f)| a - f)
            .collect();
        self.state = Some(Fitted {
            dynamics,
            last,
            sigma2,
            aic,
            fitted,
            residuals,
        });
        debug!(model = %self.describe(), aic, sigma2, "TBATS fitted");
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        let path = self.point_path(state, horizon);
        Ok(Forecast::from_values(
            path.into_iter().map(|v| self.back(v)).collect(),
        ))
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        check_level(level)?;
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        let path = self.point_path(state, horizon);
        let psi = state.dynamics.impulse_response(horizon);
        let z = z_for_level(level);

        let mut cumulative = 1.0;
        let mut point = Vec::with_capacity(horizon);
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for (h, &mean) in path.iter().enumerate() {
            if h > 0 {
                cumulative += psi[h - 1] * psi[h - 1];
            }
            let half = z * (state.sigma2 * cumulative).sqrt();
            point.push(self.back(mean));
            lower.push(self.back(mean - half));
            upper.push(self.back(mean + half));
        }
        Forecast::from_values_with_intervals(point, lower, upper)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "TBATS"
    }
}
