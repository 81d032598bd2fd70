//! Neural network autoregression.
//!
//! A feed-forward network with one tanh hidden layer maps lagged values
//! `y_{t-1} .. y_{t-p}` and seasonal lags `y_{t-m} .. y_{t-Pm}` (or, in the
//! Fourier variant, harmonic terms at `t`) to `y_t`. Several networks are
//! trained from different seeded starting weights and their outputs
//! averaged. Forecasts are produced recursively, feeding each prediction
//! back in as a lag.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::Forecaster;
use crate::transform::FourierTerms;
use crate::utils::stats::{mean, std_dev};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Gradient-descent settings shared by every network of an ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub momentum: f64,
    pub weight_decay: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 300,
            learning_rate: 0.05,
            momentum: 0.9,
            weight_decay: 1e-3,
        }
    }
}

/// `inputs -> hidden (tanh) -> 1 (linear)`.
#[derive(Debug, Clone)]
struct Network {
    inputs: usize,
    hidden: usize,
    /// Row-major `hidden x inputs`.
    w1: Vec<f64>,
    b1: Vec<f64>,
    w2: Vec<f64>,
    b2: f64,
}

impl Network {
    fn random(inputs: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let mut draw = |k: usize| (0..k).map(|_| rng.gen_range(-0.5..0.5)).collect::<Vec<f64>>();
        let w1 = draw(hidden * inputs);
        let b1 = draw(hidden);
        let w2 = draw(hidden);
        let b2 = draw(1)[0];
        Self {
            inputs,
            hidden,
            w1,
            b1,
            w2,
            b2,
        }
    }

    fn activations(&self, x: &[f64], h: &mut [f64]) {
        for (j, hj) in h.iter_mut().enumerate() {
            let row = &self.w1[j * self.inputs..(j + 1) * self.inputs];
            let z = self.b1[j] + row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>();
            *hj = z.tanh();
        }
    }

    fn output(&self, x: &[f64]) -> f64 {
        let mut h = vec![0.0; self.hidden];
        self.activations(x, &mut h);
        self.b2 + self.w2.iter().zip(&h).map(|(w, v)| w * v).sum::<f64>()
    }

    /// Full-batch gradient descent with momentum on the mean squared error
    /// plus an L2 penalty on the weights.
    fn train(&mut self, rows: &[Vec<f64>], targets: &[f64], config: &TrainingConfig) {
        let m = rows.len() as f64;
        let (ni, nh) = (self.inputs, self.hidden);
        let mut v_w1 = vec![0.0; nh * ni];
        let mut v_b1 = vec![0.0; nh];
        let mut v_w2 = vec![0.0; nh];
        let mut v_b2 = 0.0;
        let mut h = vec![0.0; nh];

        for _ in 0..config.epochs {
            let mut g_w1 = vec![0.0; nh * ni];
            let mut g_b1 = vec![0.0; nh];
            let mut g_w2 = vec![0.0; nh];
            let mut g_b2 = 0.0;

            for (x, &y) in rows.iter().zip(targets) {
                self.activations(x, &mut h);
                let out = self.b2 + self.w2.iter().zip(&h).map(|(w, v)| w * v).sum::<f64>();
                let err = out - y;
                g_b2 += err;
                for j in 0..nh {
                    g_w2[j] += err * h[j];
                    let delta = err * self.w2[j] * (1.0 - h[j] * h[j]);
                    g_b1[j] += delta;
                    let g_row = &mut g_w1[j * ni..(j + 1) * ni];
                    for (g, v) in g_row.iter_mut().zip(x) {
                        *g += delta * v;
                    }
                }
            }

            let step = |v: &mut f64, w: &mut f64, g: f64, decay: bool| {
                let g = g / m + if decay { config.weight_decay * *w } else { 0.0 };
                *v = config.momentum * *v - config.learning_rate * g;
                *w += *v;
            };
            for ((v, w), g) in v_w1.iter_mut().zip(self.w1.iter_mut()).zip(&g_w1) {
                step(v, w, *g, true);
            }
            for ((v, w), g) in v_b1.iter_mut().zip(self.b1.iter_mut()).zip(&g_b1) {
                step(v, w, *g, false);
            }
            for ((v, w), g) in v_w2.iter_mut().zip(self.w2.iter_mut()).zip(&g_w2) {
                step(v, w, *g, true);
            }
            step(&mut v_b2, &mut self.b2, g_b2, false);
        }
    }
}

#[derive(Debug, Clone)]
struct Trained {
    networks: Vec<Network>,
    lags: Vec<usize>,
    terms: Option<FourierTerms>,
    centre: f64,
    scale: f64,
    /// Scaled training values.
    history: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

impl Trained {
    fn inputs_at(&self, series: &[f64], t: usize) -> Vec<f64> {
        let mut x: Vec<f64> = self.lags.iter().map(|&l| series[t - l]).collect();
        if let Some(terms) = &self.terms {
            x.extend(terms.row(t));
        }
        x
    }

    fn average(&self, x: &[f64]) -> f64 {
        self.networks.iter().map(|n| n.output(x)).sum::<f64>() / self.networks.len() as f64
    }
}

/// NNAR(p, P, k) ensemble.
#[derive(Debug, Clone)]
pub struct NNAR {
    p: usize,
    cap_p: usize,
    harmonics: Option<Vec<usize>>,
    size: Option<usize>,
    repeats: usize,
    seed: u64,
    training: TrainingConfig,
    state: Option<Trained>,
}

impl NNAR {
    /// `p` ordinary lags and `cap_p` seasonal lags of the first declared
    /// period.
    pub fn new(p: usize, cap_p: usize) -> Self {
        Self {
            p,
            cap_p,
            harmonics: None,
            size: None,
            repeats: 20,
            seed: 42,
            training: TrainingConfig::default(),
            state: None,
        }
    }

    /// `p` ordinary lags plus `harmonics[i]` Fourier pairs per declared
    /// period in place of seasonal lags.
    pub fn with_fourier(p: usize, harmonics: Vec<usize>) -> Self {
        Self {
            harmonics: Some(harmonics),
            ..Self::new(p, 0)
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size.max(1));
        self
    }

    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    /// Lags used in the last fit, ascending.
    pub fn lags(&self) -> Option<&[usize]> {
        self.state.as_ref().map(|s| s.lags.as_slice())
    }

    /// Hidden units used in the last fit.
    pub fn hidden_size(&self) -> Option<usize> {
        self.state
            .as_ref()
            .and_then(|s| s.networks.first())
            .map(|n| n.hidden)
    }

    fn lag_set(&self, series: &TimeSeries) -> Result<Vec<usize>> {
        let mut lags: Vec<usize> = (1..=self.p).collect();
        if self.cap_p > 0 {
            let period = series
                .seasonal_periods()
                .first()
                .map(|m| m.round() as usize)
                .filter(|&m| m >= 2)
                .ok_or_else(|| {
                    ForecastError::InvalidParameter(
                        "seasonal lags need a declared seasonal period".into(),
                    )
                })?;
            lags.extend((1..=self.cap_p).map(|k| k * period));
        }
        lags.sort_unstable();
        lags.dedup();
        if lags.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "NNAR needs at least one lag".into(),
            ));
        }
        Ok(lags)
    }
}

impl Forecaster for NNAR {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let lags = self.lag_set(series)?;
        let terms = match &self.harmonics {
            Some(k) => Some(FourierTerms::new(series.seasonal_periods(), k)?),
            None => None,
        };
        let width = lags.len() + terms.as_ref().map_or(0, |t| t.width());
        let max_lag = lags.last().copied().unwrap_or(0);
        let n = series.len();
        let needed = max_lag + (width + 1).max(10);
        if n < needed {
            return Err(ForecastError::InsufficientData { needed, got: n });
        }

        let values = series.values();
        let centre = mean(values);
        let scale = match std_dev(values) {
            s if s.is_finite() && s > 0.0 => s,
            _ => 1.0,
        };
        let history: Vec<f64> = values.iter().map(|v| (v - centre) / scale).collect();
        let hidden = self.size.unwrap_or((width + 1) / 2).max(1);

        let mut trained = Trained {
            networks: Vec::with_capacity(self.repeats),
            lags,
            terms,
            centre,
            scale,
            history,
            fitted: Vec::new(),
            residuals: Vec::new(),
        };
        let rows: Vec<Vec<f64>> = (max_lag..n)
            .map(|t| trained.inputs_at(&trained.history, t))
            .collect();
        let targets = trained.history[max_lag..].to_vec();

        let mut rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..self.repeats {
            let mut net = Network::random(width, hidden, &mut rng);
            net.train(&rows, &targets, &self.training);
            trained.networks.push(net);
        }

        let mut fitted = vec![f64::NAN; max_lag];
        fitted.extend(rows.iter().map(|x| trained.average(x) * scale + centre));
        trained.residuals = values.iter().zip(&fitted).map(|(y, f)| y - f).collect();
        trained.fitted = fitted;
        debug!(
            lags = ?trained.lags,
            inputs = width,
            hidden,
            repeats = self.repeats,
            "NNAR trained"
        );
        self.state = Some(trained);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        let mut extended = state.history.clone();
        for _ in 0..horizon {
            let t = extended.len();
            let x = state.inputs_at(&extended, t);
            extended.push(state.average(&x));
        }
        let n = state.history.len();
        Ok(Forecast::from_values(
            extended[n..]
                .iter()
                .map(|v| v * state.scale + state.centre)
                .collect(),
        ))
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "NNAR"
    }
}
