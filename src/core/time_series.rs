//! Daily time series with declared seasonal periods.

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use ring::digest;

/// Seasonal periods of daily electricity load: weekly and yearly.
pub const DAILY_SEASONALITY: [f64; 2] = [7.0, 365.25];

/// A contiguous run of daily observations.
///
/// Dates are consecutive calendar days with no gaps and every value is
/// finite. The declared seasonal periods travel with the series so models
/// never have to be told them separately.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    seasonal_periods: Vec<f64>,
}

/// Builder for [`TimeSeries`].
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesBuilder {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    seasonal_periods: Option<Vec<f64>>,
    anchor: Option<NaiveDate>,
}

impl TimeSeriesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dates(mut self, dates: Vec<NaiveDate>) -> Self {
        self.dates = dates;
        self
    }

    pub fn values(mut self, values: Vec<f64>) -> Self {
        self.values = values;
        self
    }

    /// Set dates and values from `(date, value)` pairs.
    pub fn observations(mut self, observations: &[(NaiveDate, f64)]) -> Self {
        self.dates = observations.iter().map(|(d, _)| *d).collect();
        self.values = observations.iter().map(|(_, v)| *v).collect();
        self
    }

    /// Defaults to [`DAILY_SEASONALITY`].
    pub fn seasonal_periods(mut self, periods: Vec<f64>) -> Self {
        self.seasonal_periods = Some(periods);
        self
    }

    /// Drop observations before `anchor`, which must be one of the dates.
    pub fn anchor(mut self, anchor: NaiveDate) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn build(self) -> Result<TimeSeries> {
        if self.dates.len() != self.values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.dates.len(),
                got: self.values.len(),
            });
        }
        let start = match self.anchor {
            Some(anchor) => self.dates.iter().position(|d| *d == anchor).ok_or_else(|| {
                ForecastError::TimestampError(format!("anchor {anchor} is not an observed date"))
            })?,
            None => 0,
        };
        TimeSeries::new(
            self.dates[start..].to_vec(),
            self.values[start..].to_vec(),
            self.seasonal_periods
                .unwrap_or_else(|| DAILY_SEASONALITY.to_vec()),
        )
    }
}

impl TimeSeries {
    /// Validate and wrap daily observations.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>, seasonal_periods: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: dates.len(),
                got: values.len(),
            });
        }
        if values.is_empty() {
            return Err(ForecastError::EmptyData);
        }
        for pair in dates.windows(2) {
            if pair[1] - pair[0] != Duration::days(1) {
                return Err(ForecastError::TimestampError(format!(
                    "dates must be consecutive days, found {} followed by {}",
                    pair[0], pair[1]
                )));
            }
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::MissingValues);
        }
        if let Some(p) = seasonal_periods.iter().find(|p| !(p.is_finite() && **p > 1.0)) {
            return Err(ForecastError::InvalidParameter(format!(
                "seasonal period must exceed 1, got {p}"
            )));
        }
        Ok(Self {
            dates,
            values,
            seasonal_periods,
        })
    }

    /// Daily series starting at `start` with the default seasonal periods.
    pub fn daily(start: NaiveDate, values: Vec<f64>) -> Result<Self> {
        let dates = (0..values.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        Self::new(dates, values, DAILY_SEASONALITY.to_vec())
    }

    /// Same values and dates, different declared periods.
    pub fn with_seasonal_periods(mut self, periods: Vec<f64>) -> Result<Self> {
        self.seasonal_periods = periods;
        Self::new(self.dates, self.values, self.seasonal_periods)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn seasonal_periods(&self) -> &[f64] {
        &self.seasonal_periods
    }

    /// Periods rounded to whole days, deduplicated, in declaration order.
    pub fn integer_periods(&self) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        for p in &self.seasonal_periods {
            let r = p.round() as usize;
            if r > 1 && !out.contains(&r) {
                out.push(r);
            }
        }
        out
    }

    pub fn start_date(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn end_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    /// The `horizon` days following the last observation.
    pub fn future_dates(&self, horizon: usize) -> Vec<NaiveDate> {
        let end = self.end_date();
        (1..=horizon as i64).map(|i| end + Duration::days(i)).collect()
    }

    /// Observations `start..end` as a new series with the same periods.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if end > self.len() {
            return Err(ForecastError::IndexOutOfBounds {
                index: end,
                size: self.len(),
            });
        }
        if start >= end {
            return Err(ForecastError::EmptyData);
        }
        Ok(Self {
            dates: self.dates[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
            seasonal_periods: self.seasonal_periods.clone(),
        })
    }

    /// SHA-256 over the dates and the little-endian value bytes.
    ///
    /// Identifies the exact training data a fitted model was built from.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut ctx = digest::Context::new(&digest::SHA256);
        ctx.update(&(self.len() as u64).to_le_bytes());
        for (d, v) in self.dates.iter().zip(&self.values) {
            ctx.update(d.to_string().as_bytes());
            ctx.update(&v.to_le_bytes());
        }
        for p in &self.seasonal_periods {
            ctx.update(&p.to_le_bytes());
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(ctx.finish().as_ref());
        out
    }
}
