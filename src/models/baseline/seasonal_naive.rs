//! Seasonal naive baseline.
//!
//! Day `k` of the forecast repeats the observation one full cycle earlier.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::traits::check_level;
use crate::models::Forecaster;
use crate::utils::stats::z_for_level;

/// Seasonal naive forecaster with an integer period in days.
#[derive(Debug, Clone)]
pub struct SeasonalNaive {
    period: usize,
    last_cycle: Option<Vec<f64>>,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
    sigma: f64,
}

impl SeasonalNaive {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            last_cycle: None,
            fitted: None,
            residuals: None,
            sigma: 0.0,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    fn point(&self, cycle: &[f64], horizon: usize) -> Vec<f64> {
        (0..horizon).map(|h| cycle[h % self.period]).collect()
    }
}

impl Default for SeasonalNaive {
    fn default() -> Self {
        Self::new(7)
    }
}

impl Forecaster for SeasonalNaive {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.values();
        let n = values.len();
        if n < self.period {
            return Err(ForecastError::InsufficientData {
                needed: self.period,
                got: n,
            });
        }

        let fitted: Vec<f64> = (0..n)
            .map(|i| {
                if i < self.period {
                    f64::NAN
                } else {
                    values[i - self.period]
                }
            })
            .collect();
        let residuals: Vec<f64> = values.iter().zip(&fitted).map(|(y, f)| y - f).collect();

        let valid: Vec<f64> = residuals.iter().copied().filter(|r| r.is_finite()).collect();
        self.sigma = if valid.is_empty() {
            0.0
        } else {
            (valid.iter().map(|r| r * r).sum::<f64>() / valid.len() as f64).sqrt()
        };

        self.last_cycle = Some(values[n - self.period..].to_vec());
        self.fitted = Some(fitted);
        self.residuals = Some(residuals);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let cycle = self.last_cycle.as_ref().ok_or(ForecastError::FitRequired)?;
        Ok(Forecast::from_values(self.point(cycle, horizon)))
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        check_level(level)?;
        let cycle = self.last_cycle.as_ref().ok_or(ForecastError::FitRequired)?;
        let point = self.point(cycle, horizon);
        let z = z_for_level(level);

        // error variance grows with the number of whole cycles ahead
        let half_width: Vec<f64> = (0..horizon)
            .map(|h| z * self.sigma * (((h / self.period) + 1) as f64).sqrt())
            .collect();
        let lower = point.iter().zip(&half_width).map(|(p, w)| p - w).collect();
        let upper = point.iter().zip(&half_width).map(|(p, w)| p + w).collect();
        Forecast::from_values_with_intervals(point, lower, upper)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        "SeasonalNaive"
    }
}
