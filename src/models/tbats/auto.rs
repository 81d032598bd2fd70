//! Automatic TBATS selection.
//!
//! Harmonic counts are picked per period by AIC of a Fourier regression on
//! the raw series. The Box-Cox, trend and damping combinations are then
//! each fitted and compared by AIC. Finally an ARMA(p, q) for the errors
//! is proposed by [`AutoARIMA`] on the winner's residuals and kept only if
//! it lowers the AIC.

use super::model::{max_harmonics, TBATS};
use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::arima::{AutoARIMA, AutoARIMAConfig};
use crate::models::Forecaster;
use crate::transform::{boxcox_lambda, FourierTerms};
use crate::utils::ols::ols_fit;
use tracing::{debug, warn};

/// Which structural options [`AutoTBATS`] may try.
#[derive(Debug, Clone)]
pub struct AutoTBATSConfig {
    pub try_box_cox: bool,
    pub try_trend: bool,
    pub try_damping: bool,
    pub try_arma_errors: bool,
    /// Cap on the harmonic count of any one period.
    pub max_harmonics: usize,
}

impl Default for AutoTBATSConfig {
    fn default() -> Self {
        Self {
            try_box_cox: true,
            try_trend: true,
            try_damping: true,
            try_arma_errors: true,
            max_harmonics: 10,
        }
    }
}

impl AutoTBATSConfig {
    pub fn without_box_cox(mut self) -> Self {
        self.try_box_cox = false;
        self
    }

    pub fn without_damping(mut self) -> Self {
        self.try_damping = false;
        self
    }

    pub fn without_arma_errors(mut self) -> Self {
        self.try_arma_errors = false;
        self
    }

    pub fn with_max_harmonics(mut self, k: usize) -> Self {
        self.max_harmonics = k.max(1);
        self
    }
}

/// Fully automatic TBATS driven by the series' declared seasonal periods.
#[derive(Debug, Clone, Default)]
pub struct AutoTBATS {
    config: AutoTBATSConfig,
    best: Option<TBATS>,
    candidates: Vec<(String, f64)>,
}

impl AutoTBATS {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AutoTBATSConfig) -> Self {
        Self {
            config,
            best: None,
            candidates: Vec::new(),
        }
    }

    pub fn best_model(&self) -> Option<&TBATS> {
        self.best.as_ref()
    }

    /// Description and AIC of every structure that could be fitted.
    pub fn candidates(&self) -> &[(String, f64)] {
        &self.candidates
    }

    fn structures(&self) -> Vec<(bool, bool)> {
        let mut out = vec![(false, false)];
        if self.config.try_trend {
            out.push((true, false));
            if self.config.try_damping {
                out.push((true, true));
            }
        }
        out
    }

    fn try_fit(&mut self, mut model: TBATS, series: &TimeSeries, best: &mut Option<(f64, TBATS)>) {
        match model.fit(series) {
            Ok(()) => {
                let Some(aic) = model.aic().filter(|a| a.is_finite()) else {
                    return;
                };
                self.candidates.push((model.describe(), aic));
                if best.as_ref().map_or(true, |(b, _)| aic < *b) {
                    *best = Some((aic, model));
                }
            }
            Err(err) => debug!(model = %model.describe(), error = %err, "TBATS candidate skipped"),
        }
    }

    /// ARMA orders suggested by the residual autocorrelation of `model`.
    fn arma_suggestion(model: &TBATS, series: &TimeSeries) -> Option<(usize, usize)> {
        let residuals = model.residuals()?.to_vec();
        let resid = TimeSeries::new(series.dates().to_vec(), residuals, Vec::new()).ok()?;
        let config = AutoARIMAConfig::default()
            .with_max_orders(2, 0, 2)
            .without_constant();
        let mut arima = AutoARIMA::with_config(config);
        arima.fit(&resid).ok()?;
        let (p, _, q) = arima.selected_order()?;
        (p + q > 0).then_some((p, q))
    }
}

/// Harmonic count per period, each chosen in turn by the AIC of a
/// regression on a linear trend and the Fourier terms.
pub fn select_harmonics(values: &[f64], periods: &[f64], cap: usize) -> Result<Vec<usize>> {
    let n = values.len();
    let mut ks = vec![1; periods.len()];
    for i in 0..periods.len() {
        let limit = max_harmonics(periods[i]).min(cap);
        if limit == 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "period {} is too short for trigonometric seasonality",
                periods[i]
            )));
        }
        let mut best = (f64::INFINITY, 1);
        for k in 1..=limit {
            ks[i] = k;
            let terms = FourierTerms::new(periods, &ks)?;
            if terms.width() + 2 >= n {
                break;
            }
            let mut x = terms.generate(0, n)?;
            x.push("trend", (0..n).map(|t| t as f64).collect())?;
            let aic = ols_fit(values, &x)?.aic(n);
            if aic < best.0 {
                best = (aic, k);
            }
        }
        ks[i] = best.1;
    }
    Ok(ks)
}

impl Forecaster for AutoTBATS {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.values();
        let n = values.len();
        if n < 10 {
            return Err(ForecastError::InsufficientData { needed: 10, got: n });
        }

        let periods: Vec<f64> = series
            .seasonal_periods()
            .iter()
            .copied()
            .filter(|&m| m > 2.0 && 2.0 * m <= n as f64)
            .collect();
        if periods.len() < series.seasonal_periods().len() {
            warn!(
                declared = ?series.seasonal_periods(),
                used = ?periods,
                n,
                "seasonal periods longer than half the series dropped"
            );
        }
        let harmonics = select_harmonics(values, &periods, self.config.max_harmonics)?;

        let mut lambdas = vec![None];
        if self.config.try_box_cox && values.iter().all(|v| *v > 0.0) {
            let block = periods.first().map_or(2, |m| m.round() as usize);
            lambdas.push(Some(boxcox_lambda(values, block, 0.0, 1.0)));
        }

        self.candidates.clear();
        let mut best: Option<(f64, TBATS)> = None;
        for lambda in &lambdas {
            for (trend, damped) in self.structures() {
                let mut model = TBATS::new(periods.clone()).with_harmonics(harmonics.clone());
                if let Some(l) = lambda {
                    model = model.with_box_cox(*l);
                }
                model = match (trend, damped) {
                    (false, _) => model.without_trend(),
                    (true, true) => model.with_damped_trend(),
                    (true, false) => model,
                };
                self.try_fit(model, series, &mut best);
            }
        }

        if self.config.try_arma_errors {
            let proposal = best
                .as_ref()
                .and_then(|(_, m)| Self::arma_suggestion(m, series).map(|o| (m.clone(), o)));
            if let Some((base, (p, q))) = proposal {
                self.try_fit(base.with_arma(p, q), series, &mut best);
            }
        }

        let (aic, model) = best.ok_or_else(|| {
            ForecastError::ComputationError("no TBATS structure could be fitted".into())
        })?;
        debug!(model = %model.describe(), aic, tried = self.candidates.len(), "TBATS selected");
        self.best = Some(model);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        self.best
            .as_ref()
            .ok_or(ForecastError::FitRequired)?
            .predict(horizon)
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        self.best
            .as_ref()
            .ok_or(ForecastError::FitRequired)?
            .predict_with_intervals(horizon, level)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.best.as_ref().and_then(|m| m.fitted_values())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.best.as_ref().and_then(|m| m.residuals())
    }

    fn name(&self) -> &str {
        "TBATS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn series(values: Vec<f64>) -> TimeSeries {
        TimeSeries::daily(NaiveDate::from_ymd_opt(2008, 1, 1).unwrap(), values).unwrap()
    }

    fn load_like(n: usize) -> TimeSeries {
        let mut rng = StdRng::seed_from_u64(3);
        series(
            (0..n)
                .map(|i| {
                    let t = i as f64;
                    800.0
                        + 70.0 * (2.0 * PI * t / 7.0).cos()
                        + 150.0 * (2.0 * PI * t / 365.25).cos()
                        + rng.gen_range(-10.0..10.0)
                })
                .collect(),
        )
    }

    #[test]
    fn selects_and_forecasts() {
        let mut model = AutoTBATS::new();
        model.fit(&load_like(760)).unwrap();
        let best = model.best_model().unwrap();
        assert_eq!(best.seasonal_periods(), &[7.0, 365.25]);
        // both lambdas times three trend structures
        assert!(model.candidates().len() >= 6);
        let f = model.predict_with_intervals(31, 0.95).unwrap();
        assert_eq!(f.horizon(), 31);
        assert!(f.point().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn structures_follow_config() {
        let config = AutoTBATSConfig::default()
            .without_box_cox()
            .without_damping()
            .without_arma_errors();
        let mut model = AutoTBATS::with_config(config);
        model.fit(&load_like(300)).unwrap();
        assert_eq!(model.candidates().len(), 2);
        assert!(model.best_model().unwrap().lambda().is_none());
    }

    #[test]
    fn yearly_period_dropped_on_short_series() {
        let config = AutoTBATSConfig::default().without_arma_errors();
        let mut model = AutoTBATS::with_config(config);
        model.fit(&load_like(200)).unwrap();
        assert_eq!(model.best_model().unwrap().seasonal_periods(), &[7.0]);
    }

    #[test]
    fn harmonic_selection_finds_the_third_harmonic() {
        let mut rng = StdRng::seed_from_u64(5);
        let values: Vec<f64> = (0..280)
            .map(|i| {
                let t = i as f64;
                10.0 + 4.0 * (2.0 * PI * 3.0 * t / 7.0).cos()
                    + 2.0 * (2.0 * PI * t / 7.0).sin()
                    + rng.gen_range(-0.2..0.2)
            })
            .collect();
        assert_eq!(select_harmonics(&values, &[7.0], 10).unwrap(), vec![3]);
    }

    #[test]
    fn requires_data_and_fit() {
        let mut model = AutoTBATS::new();
        assert!(matches!(
            model.fit(&series(vec![1.0; 5])),
            Err(ForecastError::InsufficientData { .. })
        ));
        assert_eq!(model.predict(2).unwrap_err(), ForecastError::FitRequired);
        assert_eq!(model.name(), "TBATS");
    }
}
