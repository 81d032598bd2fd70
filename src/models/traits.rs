//! Forecaster trait defining the common interface for all models.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};

/// Common fit/forecast contract of every model in the bank.
///
/// A model receives the training series explicitly and keeps only what it
/// estimated from it. Object safe; the bank holds `Box<dyn Forecaster>`.
pub trait Forecaster {
    /// Estimate the model from `series`, replacing any earlier fit.
    fn fit(&mut self, series: &TimeSeries) -> Result<()>;

    /// Point forecasts for the `horizon` days after the training data.
    fn predict(&self, horizon: usize) -> Result<Forecast>;

    /// Forecasts with prediction intervals at coverage `level` (e.g. 0.95).
    ///
    /// Models without an interval theory return point forecasts only.
    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        let _ = level;
        self.predict(horizon)
    }

    /// In-sample one-step fitted values, NaN where undefined.
    fn fitted_values(&self) -> Option<&[f64]>;

    /// Actual minus fitted, aligned with the training data.
    fn residuals(&self) -> Option<&[f64]>;

    fn name(&self) -> &str;

    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}

/// Boxed trait object used by the model bank.
pub type BoxedForecaster = Box<dyn Forecaster>;

/// Reject interval levels outside `(0, 1)`.
pub(crate) fn check_level(level: f64) -> Result<()> {
    if level > 0.0 && level < 1.0 {
        Ok(())
    } else {
        Err(ForecastError::InvalidParameter(format!(
            "interval level must be in (0, 1), got {level}"
        )))
    }
}
