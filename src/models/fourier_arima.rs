//! Regression on Fourier terms with ARIMA errors.
//!
//! The (optionally log-transformed) series is regressed on `K_i` sin/cos
//! pairs per declared seasonal period. The regression residuals are then
//! modelled by automatically selected non-seasonal ARIMA. Forecasts add the
//! regression continued into the horizon to the ARIMA forecast and undo
//! the transform.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::arima::{AutoARIMA, AutoARIMAConfig};
use crate::models::traits::check_level;
use crate::models::Forecaster;
use crate::transform::{BoxCox, FourierTerms};
use crate::utils::ols::{ols_fit, OlsFit};
use tracing::debug;

#[derive(Debug, Clone)]
struct Fitted {
    terms: FourierTerms,
    regression: OlsFit,
    errors: AutoARIMA,
    n: usize,
}

/// Dynamic harmonic regression.
#[derive(Debug, Clone)]
pub struct FourierArima {
    harmonics: Vec<usize>,
    transform: Option<BoxCox>,
    arima_config: AutoARIMAConfig,
    state: Option<Fitted>,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
}

impl FourierArima {
    /// `harmonics[i]` pairs for the series' `i`-th seasonal period, with a
    /// log transform.
    pub fn new(harmonics: Vec<usize>) -> Self {
        Self {
            harmonics,
            transform: Some(BoxCox::log()),
            arima_config: AutoARIMAConfig::default(),
            state: None,
            fitted: None,
            residuals: None,
        }
    }

    /// Model the series on its original scale.
    pub fn without_transform(mut self) -> Self {
        self.transform = None;
        self
    }

    pub fn with_arima_config(mut self, config: AutoARIMAConfig) -> Self {
        self.arima_config = config;
        self
    }

    pub fn harmonics(&self) -> &[usize] {
        &self.harmonics
    }

    /// Regression coefficients, once fitted.
    pub fn regression(&self) -> Option<&OlsFit> {
        self.state.as_ref().map(|s| &s.regression)
    }

    /// `(p, d, q)` chosen for the regression errors.
    pub fn error_order(&self) -> Option<(usize, usize, usize)> {
        self.state.as_ref().and_then(|s| s.errors.selected_order())
    }

    fn back(&self, v: f64) -> f64 {
        match self.transform {
            Some(t) => t.inverse_one(v),
            None => v,
        }
    }

    /// Forecast on the transformed scale, before back-transforming.
    fn transformed_forecast(&self, horizon: usize, level: Option<f64>) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        let future = state.terms.generate(state.n, horizon)?;
        let regression = state.regression.predict(&future)?;
        let errors = match level {
            Some(level) => state.errors.predict_with_intervals(horizon, level)?,
            None => state.errors.predict(horizon)?,
        };
        errors.shifted_by(&regression)
    }
}

impl Forecaster for FourierArima {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let periods = series.seasonal_periods();
        let terms = FourierTerms::new(periods, &self.harmonics)?;
        let n = series.len();
        let y = match self.transform {
            Some(t) => t.transform(series.values())?,
            None => series.values().to_vec(),
        };

        let x = terms.generate(0, n)?;
        let regression = ols_fit(&y, &x)?;
        let resid = regression.residuals(&y, &x)?;
        let resid_series = TimeSeries::new(series.dates().to_vec(), resid, Vec::new())?;
        let mut errors = AutoARIMA::with_config(self.arima_config.clone());
        errors.fit(&resid_series)?;
        debug!(
            harmonics = ?self.harmonics,
            columns = terms.width(),
            order = ?errors.selected_order(),
            "Fourier regression fitted"
        );

        let reg_fitted = regression.predict(&x)?;
        let err_fitted = errors.fitted_values().ok_or(ForecastError::FitRequired)?;
        let fitted: Vec<f64> = reg_fitted
            .iter()
            .zip(err_fitted)
            .map(|(r, e)| self.back(r + e))
            .collect();
        let residuals = series
            .values()
            .iter()
            .zip(&fitted)
            .map(|(a, f)| a - f)
            .collect();

        self.state = Some(Fitted {
            terms,
            regression,
            errors,
            n,
        });
        self.fitted = Some(fitted);
        self.residuals = Some(residuals);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        Ok(self
            .transformed_forecast(horizon, None)?
            .map(|v| self.back(v)))
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        check_level(level)?;
        Ok(self
            .transformed_forecast(horizon, Some(level))?
            .map(|v| self.back(v)))
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        "ARIMA+Fourier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::f64::consts::PI;

    fn daily_load(n: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2006, 1, 1).unwrap();
        let values = (0..n)
            .map(|i| {
                let t = i as f64;
                1000.0
                    + 80.0 * (2.0 * PI * t / 7.0).cos()
                    + 200.0 * (2.0 * PI * t / 365.25).cos()
                    + ((i * 31) % 17) as f64
            })
            .collect();
        TimeSeries::daily(start, values).unwrap()
    }

    fn quick() -> AutoARIMAConfig {
        AutoARIMAConfig::default().with_max_orders(2, 1, 2)
    }

    #[test]
    fn forecast_length_independent_of_k() {
        let series = daily_load(800);
        let mut lengths = Vec::new();
        for k in [2, 4, 6, 12] {
            let mut model = FourierArima::new(vec![2, k]).with_arima_config(quick());
            model.fit(&series).unwrap();
            lengths.push(model.predict(31).unwrap().horizon());
        }
        assert_eq!(lengths, vec![31; 4]);
    }

    #[test]
    fn follows_the_yearly_cycle() {
        let series = daily_load(900);
        let mut model = FourierArima::new(vec![2, 4]).with_arima_config(quick());
        model.fit(&series).unwrap();
        let f = model.predict(200).unwrap();
        // day 913 sits in a yearly trough, day 1095 on the next peak,
        // both on the same weekday phase
        let trough = f.point()[913 - 900];
        let peak = f.point()[1095 - 900];
        assert!(peak > trough + 150.0);
        assert!(f.point().iter().all(|v| *v > 0.0));
    }

    #[test]
    fn log_transform_rejects_non_positive_data() {
        let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        let mut values = vec![10.0; 60];
        values[5] = 0.0;
        let series = TimeSeries::daily(start, values).unwrap();
        let mut model = FourierArima::new(vec![2, 2]);
        assert!(matches!(
            model.fit(&series),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn harmonic_count_must_match_periods() {
        let mut model = FourierArima::new(vec![2]);
        assert!(matches!(
            model.fit(&daily_load(100)),
            Err(ForecastError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn no_seasonal_periods_fits_intercept_and_errors() {
        let series = daily_load(200).with_seasonal_periods(Vec::new()).unwrap();
        let mut model = FourierArima::new(Vec::new()).with_arima_config(quick());
        model.fit(&series).unwrap();
        assert_eq!(model.fitted_values().unwrap().len(), 200);
        let f = model.predict(31).unwrap();
        assert_eq!(f.horizon(), 31);
        assert!(f.point().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn intervals_bracket_point() {
        let mut model = FourierArima::new(vec![2, 2]).with_arima_config(quick());
        model.fit(&daily_load(400)).unwrap();
        let f = model.predict_with_intervals(14, 0.8).unwrap();
        for i in 0..14 {
            assert!(f.lower().unwrap()[i] < f.point()[i]);
            assert!(f.upper().unwrap()[i] > f.point()[i]);
        }
    }
}
