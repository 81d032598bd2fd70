//! Automatic selection among the non-seasonal ETS models.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::exponential::ets::{ETSSpec, ErrorType, TrendType, ETS};
use crate::models::Forecaster;
use tracing::debug;

/// Information criterion used to rank candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionCriterion {
    AIC,
    #[default]
    AICc,
    BIC,
}

/// Candidate space for [`AutoETS`].
#[derive(Debug, Clone)]
pub struct AutoETSConfig {
    pub criterion: SelectionCriterion,
    pub allow_multiplicative_error: bool,
    pub allow_trend: bool,
    pub allow_damped: bool,
}

impl Default for AutoETSConfig {
    fn default() -> Self {
        Self {
            criterion: SelectionCriterion::AICc,
            allow_multiplicative_error: true,
            allow_trend: true,
            allow_damped: true,
        }
    }
}

impl AutoETSConfig {
    pub fn additive_only(mut self) -> Self {
        self.allow_multiplicative_error = false;
        self
    }

    pub fn with_criterion(mut self, criterion: SelectionCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    fn candidates(&self, positive: bool) -> Vec<ETSSpec> {
        let mut errors = vec![ErrorType::Additive];
        if self.allow_multiplicative_error && positive {
            errors.push(ErrorType::Multiplicative);
        }
        let mut trends = vec![TrendType::None];
        if self.allow_trend {
            trends.push(TrendType::Additive);
            if self.allow_damped {
                trends.push(TrendType::AdditiveDamped);
            }
        }
        errors
            .iter()
            .flat_map(|&e| trends.iter().map(move |&t| ETSSpec::new(e, t)))
            .collect()
    }
}

/// Fits every candidate ETS model and keeps the one with the lowest criterion.
#[derive(Debug, Clone, Default)]
pub struct AutoETS {
    config: AutoETSConfig,
    selected: Option<ETS>,
    scores: Vec<(ETSSpec, f64)>,
}

impl AutoETS {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AutoETSConfig) -> Self {
        Self {
            config,
            selected: None,
            scores: Vec::new(),
        }
    }

    pub fn selected_spec(&self) -> Option<ETSSpec> {
        self.selected.as_ref().map(|m| m.spec())
    }

    /// Criterion value of every candidate that fitted.
    pub fn model_scores(&self) -> &[(ETSSpec, f64)] {
        &self.scores
    }

    fn score(&self, model: &ETS) -> Option<f64> {
        match self.config.criterion {
            SelectionCriterion::AIC => model.aic(),
            SelectionCriterion::AICc => model.aicc(),
            SelectionCriterion::BIC => model.bic(),
        }
    }
}

impl Forecaster for AutoETS {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let positive = series.values().iter().all(|v| *v > 0.0);
        self.scores.clear();
        let mut best: Option<(f64, ETS)> = None;

        for spec in self.config.candidates(positive) {
            let mut model = ETS::new(spec);
            if let Err(err) = model.fit(series) {
                debug!(model = %spec.short_name(), error = %err, "candidate skipped");
                continue;
            }
            let Some(score) = self.score(&model).filter(|s| s.is_finite()) else {
                continue;
            };
            self.scores.push((spec, score));
            if best.as_ref().map_or(true, |(b, _)| score < *b) {
                best = Some((score, model));
            }
        }

        let (score, model) = best.ok_or_else(|| {
            ForecastError::ComputationError("no ETS candidate could be fitted".into())
        })?;
        debug!(model = %model.spec().short_name(), score, "ETS selected");
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
        "AutoETS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(values: Vec<f64>) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2008, 1, 1).unwrap();
        TimeSeries::daily(start, values)
            .unwrap()
            .with_seasonal_periods(vec![])
            .unwrap()
    }

    #[test]
    fn tries_all_candidates_on_positive_data() {
        let y: Vec<f64> = (0..120).map(|i| 100.0 + 0.5 * i as f64 + ((i * 37) % 11) as f64).collect();
        let mut model = AutoETS::new();
        model.fit(&series(y)).unwrap();
        assert_eq!(model.model_scores().len(), 6);
        assert!(model.selected_spec().is_some());
        assert_eq!(model.predict(30).unwrap().horizon(), 30);
    }

    #[test]
    fn multiplicative_candidates_skipped_for_negative_data() {
        let y: Vec<f64> = (0..60).map(|i| ((i * 13) % 7) as f64 - 3.0).collect();
        let mut model = AutoETS::with_config(AutoETSConfig::default());
        model.fit(&series(y)).unwrap();
        assert!(model
            .model_scores()
            .iter()
            .all(|(s, _)| s.error == ErrorType::Additive));
    }

    #[test]
    fn trending_data_selects_a_trend_model() {
        let y: Vec<f64> = (0..150).map(|i| 20.0 + 3.0 * i as f64 + ((i * 7) % 5) as f64 * 0.1).collect();
        let mut model = AutoETS::with_config(AutoETSConfig::default().additive_only());
        model.fit(&series(y)).unwrap();
        assert!(model.selected_spec().unwrap().has_trend());
    }
}
