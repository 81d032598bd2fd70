//! Automatic non-seasonal ARIMA order selection.
//!
//! The differencing order comes from repeated KPSS tests; `p` and `q`
//! (and whether to carry a constant) are then chosen by information
//! criterion, either by the stepwise neighbourhood walk of Hyndman and
//! Khandakar or by fitting the whole grid.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::arima::diff::ndiffs;
use crate::models::arima::model::{Constant, ModelOrder, SARIMA};
use crate::models::exponential::SelectionCriterion;
use crate::models::Forecaster;
use std::collections::HashSet;
use tracing::debug;

/// Search space for [`AutoARIMA`].
#[derive(Debug, Clone)]
pub struct AutoARIMAConfig {
    pub max_p: usize,
    pub max_q: usize,
    pub max_d: usize,
    /// Consider a mean (d = 0) or drift (d = 1) term.
    pub allow_constant: bool,
    /// Stepwise walk instead of the full grid.
    pub stepwise: bool,
    /// Upper bound on the number of fits in a stepwise walk.
    pub max_models: usize,
    pub criterion: SelectionCriterion,
}

impl Default for AutoARIMAConfig {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_q: 5,
            max_d: 2,
            allow_constant: true,
            stepwise: true,
            max_models: 94,
            criterion: SelectionCriterion::AICc,
        }
    }
}

impl AutoARIMAConfig {
    pub fn with_max_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_p = max_p;
        self.max_d = max_d;
        self.max_q = max_q;
        self
    }

    pub fn exhaustive(mut self) -> Self {
        self.stepwise = false;
        self
    }

    pub fn without_constant(mut self) -> Self {
        self.allow_constant = false;
        self
    }

    pub fn with_criterion(mut self, criterion: SelectionCriterion) -> Self {
        self.criterion = criterion;
        self
    }
}

/// One point of the search: orders plus whether a constant is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Candidate {
    p: usize,
    q: usize,
    constant: bool,
}

/// Automatic ARIMA(p, d, q) selection.
#[derive(Debug, Clone)]
pub struct AutoARIMA {
    config: AutoARIMAConfig,
    selected: Option<SARIMA>,
    model_scores: Vec<(ModelOrder, Constant, f64)>,
}

impl AutoARIMA {
    pub fn new() -> Self {
        Self::with_config(AutoARIMAConfig::default())
    }

    pub fn with_config(config: AutoARIMAConfig) -> Self {
        Self {
            config,
            selected: None,
            model_scores: Vec::new(),
        }
    }

    /// `(p, d, q)` of the chosen model.
    pub fn selected_order(&self) -> Option<(usize, usize, usize)> {
        self.selected.as_ref().map(|m| {
            let o = m.order();
            (o.p, o.d, o.q)
        })
    }

    pub fn selected_model(&self) -> Option<&SARIMA> {
        self.selected.as_ref()
    }

    /// Every fitted candidate with its score, best first.
    pub fn model_scores(&self) -> &[(ModelOrder, Constant, f64)] {
        &self.model_scores
    }

    fn constant_for(&self, d: usize, wanted: bool) -> Constant {
        match (wanted && self.config.allow_constant, d) {
            (true, 0) => Constant::Mean,
            (true, 1) => Constant::Drift,
            _ => Constant::None,
        }
    }

    fn score(&self, model: &SARIMA) -> Option<f64> {
        match self.config.criterion {
            SelectionCriterion::AIC => model.aic(),
            SelectionCriterion::AICc => model.aicc(),
            SelectionCriterion::BIC => model.bic(),
        }
    }

    fn evaluate(&mut self, series: &TimeSeries, d: usize, c: Candidate) -> Option<(f64, SARIMA)> {
        let order = ModelOrder::arima(c.p, d, c.q);
        let constant = self.constant_for(d, c.constant);
        let mut model = SARIMA::new(order, constant);
        if let Err(err) = model.fit(series) {
            debug!(%order, error = %err, "candidate skipped");
            return None;
        }
        let score = self.score(&model).filter(|s| s.is_finite())?;
        self.model_scores.push((order, constant, score));
        Some((score, model))
    }

    fn in_range(&self, c: &Candidate) -> bool {
        c.p <= self.config.max_p && c.q <= self.config.max_q
    }

    fn neighbours(&self, c: Candidate, d: usize) -> Vec<Candidate> {
        let mut out = Vec::new();
        let steps: [(i64, i64); 8] = [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, -1), (1, 1), (-1, 1), (1, -1)];
        for (dp, dq) in steps {
            let p = c.p as i64 + dp;
            let q = c.q as i64 + dq;
            if p >= 0 && q >= 0 {
                out.push(Candidate {
                    p: p as usize,
                    q: q as usize,
                    constant: c.constant,
                });
            }
        }
        if self.config.allow_constant && d <= 1 {
            out.push(Candidate {
                constant: !c.constant,
                ..c
            });
        }
        out.retain(|n| self.in_range(n));
        out
    }

    fn stepwise(&mut self, series: &TimeSeries, d: usize) -> Option<(f64, SARIMA)> {
        let with_constant = self.config.allow_constant && d <= 1;
        let mut start = vec![
            Candidate { p: 2, q: 2, constant: with_constant },
            Candidate { p: 0, q: 0, constant: with_constant },
            Candidate { p: 1, q: 0, constant: with_constant },
            Candidate { p: 0, q: 1, constant: with_constant },
        ];
        if with_constant {
            start.push(Candidate { p: 0, q: 0, constant: false });
        }

        let mut visited: HashSet<Candidate> = HashSet::new();
        let mut best: Option<(f64, Candidate, SARIMA)> = None;
        start.retain(|c| self.in_range(c));
        for c in start {
            visited.insert(c);
            if let Some((score, model)) = self.evaluate(series, d, c) {
                if best.as_ref().map_or(true, |(b, _, _)| score < *b) {
                    best = Some((score, c, model));
                }
            }
        }

        loop {
            let Some((best_score, centre, _)) = best.as_ref() else {
                return None;
            };
            let (best_score, centre) = (*best_score, *centre);
            let mut improved = false;
            for c in self.neighbours(centre, d) {
                if visited.len() >= self.config.max_models || !visited.insert(c) {
                    continue;
                }
                if let Some((score, model)) = self.evaluate(series, d, c) {
                    if score < best_score {
                        best = Some((score, c, model));
                        improved = true;
                        break;
                    }
                }
            }
            if !improved {
                break;
            }
        }
        best.map(|(score, _, model)| (score, model))
    }

    fn exhaustive(&mut self, series: &TimeSeries, d: usize) -> Option<(f64, SARIMA)> {
        let constants: &[bool] = if self.config.allow_constant && d <= 1 {
            &[false, true]
        } else {
            &[false]
        };
        let mut best: Option<(f64, SARIMA)> = None;
        for p in 0..=self.config.max_p {
            for q in 0..=self.config.max_q {
                for &constant in constants {
                    if let Some((score, model)) = self.evaluate(series, d, Candidate { p, q, constant }) {
                        if best.as_ref().map_or(true, |(b, _)| score < *b) {
                            best = Some((score, model));
                        }
                    }
                }
            }
        }
        best
    }
}

impl Default for AutoARIMA {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for AutoARIMA {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.values();
        if values.len() < 10 {
            return Err(ForecastError::InsufficientData {
                needed: 10,
                got: values.len(),
            });
        }

        let d = ndiffs(values, self.config.max_d);
        self.model_scores.clear();
        let best = if self.config.stepwise {
            self.stepwise(series, d)
        } else {
            self.exhaustive(series, d)
        };
        self.model_scores
            .sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

        let (score, model) = best.ok_or_else(|| {
            ForecastError::ComputationError("no ARIMA candidate could be fitted".into())
        })?;
        debug!(order = %model.order(), constant = ?model.constant(), score, "ARIMA selected");
        self.selected = Some(model);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        self.selected
            .as_ref()
            .ok_or(ForecastError::FitRequired)?
            .predict(horizon)
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        self.selected
            .as_ref()
            .ok_or(ForecastError::FitRequired)?
            .predict_with_intervals(horizon, level)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.selected.as_ref().and_then(|m| m.fitted_values())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.selected.as_ref().and_then(|m| m.residuals())
    }

    fn name(&self) -> &str {
        "AutoARIMA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn series(values: Vec<f64>) -> TimeSeries {
        TimeSeries::daily(NaiveDate::from_ymd_opt(2009, 1, 1).unwrap(), values).unwrap()
    }

    fn ar1(n: usize, phi: f64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut values = vec![0.0];
        for i in 1..n {
            values.push(phi * values[i - 1] + rng.gen_range(-1.0..1.0));
        }
        values
    }

    #[test]
    fn ar_process_gets_an_ar_term() {
        let mut model = AutoARIMA::new();
        model.fit(&series(ar1(300, 0.5))).unwrap();
        let (p, d, q) = model.selected_order().unwrap();
        assert_eq!(d, 0);
        assert!(p + q >= 1);
        assert_eq!(model.predict(5).unwrap().horizon(), 5);
    }

    #[test]
    fn trend_is_differenced() {
        let noise = ar1(200, 0.0);
        let values: Vec<f64> = (0..200).map(|i| 10.0 + 1.5 * i as f64 + noise[i]).collect();
        let mut model = AutoARIMA::new();
        model.fit(&series(values)).unwrap();
        let (_, d, _) = model.selected_order().unwrap();
        assert!(d >= 1);
    }

    #[test]
    fn scores_sorted_and_exhaustive_covers_grid() {
        let config = AutoARIMAConfig::default().with_max_orders(2, 1, 2).exhaustive();
        let mut model = AutoARIMA::with_config(config);
        model.fit(&series(ar1(150, 0.5))).unwrap();
        let scores = model.model_scores();
        assert!(scores.len() > 9);
        for pair in scores.windows(2) {
            assert!(pair[1].2 >= pair[0].2);
        }
    }

    #[test]
    fn stepwise_respects_order_limits() {
        let config = AutoARIMAConfig::default().with_max_orders(1, 2, 1);
        let mut model = AutoARIMA::with_config(config);
        model.fit(&series(ar1(150, 0.6))).unwrap();
        assert!(model
            .model_scores()
            .iter()
            .all(|(o, _, _)| o.p <= 1 && o.q <= 1));
    }

    #[test]
    fn short_series_rejected() {
        let mut model = AutoARIMA::new();
        assert!(matches!(
            model.fit(&series(vec![1.0, 2.0, 3.0, 4.0, 5.0])),
            Err(ForecastError::InsufficientData { .. })
        ));
        assert_eq!(AutoARIMA::new().predict(1).unwrap_err(), ForecastError::FitRequired);
    }
}
