//! STL + ETS forecaster.
//!
//! The series is decomposed with MSTL over every declared period that fits
//! at least twice into the training data. The seasonally adjusted series
//! (trend plus remainder) is forecast with [`AutoETS`]; each seasonal
//! component is projected by repeating its last full cycle and added back.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::exponential::{AutoETS, AutoETSConfig};
use crate::models::traits::check_level;
use crate::models::Forecaster;
use crate::seasonality::{MSTLResult, MSTL};
use tracing::debug;

/// Seasonal decomposition followed by exponential smoothing.
#[derive(Debug, Clone)]
pub struct StlEts {
    iterations: usize,
    robust: bool,
    ets_config: AutoETSConfig,
    decomposition: Option<MSTLResult>,
    adjusted_model: Option<AutoETS>,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
}

impl StlEts {
    pub fn new() -> Self {
        Self {
            iterations: 2,
            robust: false,
            ets_config: AutoETSConfig::default(),
            decomposition: None,
            adjusted_model: None,
            fitted: None,
            residuals: None,
        }
    }

    /// Number of MSTL refinement passes.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    /// Robust STL inner loops.
    pub fn robust(mut self) -> Self {
        self.robust = true;
        self
    }

    pub fn with_ets_config(mut self, config: AutoETSConfig) -> Self {
        self.ets_config = config;
        self
    }

    pub fn decomposition(&self) -> Option<&MSTLResult> {
        self.decomposition.as_ref()
    }

    /// Periods that were actually used in the last fit.
    pub fn used_periods(&self) -> &[usize] {
        self.decomposition
            .as_ref()
            .map_or(&[], |d| d.seasonal_periods.as_slice())
    }

    fn seasonal_projection(decomposition: &MSTLResult, horizon: usize) -> Vec<f64> {
        let n = decomposition.trend.len();
        let mut total = vec![0.0; horizon];
        for (component, &period) in decomposition
            .seasonal_components
            .iter()
            .zip(&decomposition.seasonal_periods)
        {
            let start = n - period;
            for (h, t) in total.iter_mut().enumerate() {
                *t += component[start + h % period];
            }
        }
        total
    }

    fn parts(&self) -> Result<(&MSTLResult, &AutoETS)> {
        match (&self.decomposition, &self.adjusted_model) {
            (Some(d), Some(m)) => Ok((d, m)),
            _ => Err(ForecastError::FitRequired),
        }
    }
}

impl Default for StlEts {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for StlEts {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.values();
        let n = values.len();

        let mut mstl = MSTL::new(series.integer_periods())
            .with_iterations(self.iterations)
            .fitting(n);
        if mstl.seasonal_periods().is_empty() {
            return Err(ForecastError::InvalidParameter(
                "no seasonal period fits twice into the training data".into(),
            ));
        }
        if self.robust {
            mstl = mstl.robust();
        }
        debug!(periods = ?mstl.seasonal_periods(), n, "STL decomposition");

        let decomposition = mstl.decompose(values).ok_or_else(|| {
            ForecastError::ComputationError("MSTL decomposition failed".into())
        })?;

        let adjusted = TimeSeries::new(
            series.dates().to_vec(),
            decomposition.seasonally_adjusted(),
            Vec::new(),
        )?;
        let mut ets = AutoETS::with_config(self.ets_config.clone());
        ets.fit(&adjusted)?;

        let seasonal = decomposition.total_seasonal();
        let fitted: Vec<f64> = ets
            .fitted_values()
            .ok_or(ForecastError::FitRequired)?
            .iter()
            .zip(&seasonal)
            .map(|(f, s)| f + s)
            .collect();
        let residuals = values.iter().zip(&fitted).map(|(y, f)| y - f).collect();

        self.decomposition = Some(decomposition);
        self.adjusted_model = Some(ets);
        self.fitted = Some(fitted);
        self.residuals = Some(residuals);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let (decomposition, ets) = self.parts()?;
        let seasonal = Self::seasonal_projection(decomposition, horizon);
        ets.predict(horizon)?.shifted_by(&seasonal)
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        check_level(level)?;
        let (decomposition, ets) = self.parts()?;
        let seasonal = Self::seasonal_projection(decomposition, horizon);
        ets.predict_with_intervals(horizon, level)?
            .shifted_by(&seasonal)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        "STL+ETS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn weekly(n: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2009, 1, 1).unwrap();
        let pattern = [5.0, 3.0, 0.0, -1.0, -2.0, -4.0, -1.0];
        let values = (0..n)
            .map(|i| 200.0 + 0.1 * i as f64 + pattern[i % 7] + ((i * 17) % 5) as f64 * 0.05)
            .collect();
        TimeSeries::daily(start, values).unwrap()
    }

    #[test]
    fn yearly_period_skipped_on_short_data() {
        let mut model = StlEts::new();
        model.fit(&weekly(140)).unwrap();
        assert_eq!(model.used_periods(), &[7]);
    }

    #[test]
    fn forecast_carries_the_weekly_shape() {
        let mut model = StlEts::new();
        model.fit(&weekly(210)).unwrap();
        let f = model.predict(14).unwrap();
        assert_eq!(f.horizon(), 14);
        // day 210 is phase 0 of the weekly pattern (+5), day 215 is phase 5 (-4)
        let p = f.point();
        assert!((p[0] - p[7]).abs() < 3.0);
        assert!(p[0] - p[5] > 5.0);
    }

    #[test]
    fn intervals_contain_point() {
        let mut model = StlEts::new();
        model.fit(&weekly(140)).unwrap();
        let f = model.predict_with_intervals(10, 0.9).unwrap();
        for i in 0..10 {
            assert!(f.lower().unwrap()[i] <= f.point()[i]);
            assert!(f.upper().unwrap()[i] >= f.point()[i]);
        }
    }

    #[test]
    fn requires_a_usable_period() {
        let series = weekly(10);
        let mut model = StlEts::new();
        assert!(matches!(
            model.fit(&series),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn fitted_and_residuals_align() {
        let series = weekly(140);
        let mut model = StlEts::new();
        model.fit(&series).unwrap();
        assert_eq!(model.fitted_values().unwrap().len(), 140);
        assert_eq!(model.residuals().unwrap().len(), 140);
    }
}
