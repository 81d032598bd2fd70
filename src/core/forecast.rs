//! Forecast result structure.

use crate::error::{ForecastError, Result};

/// Point predictions with optional prediction-interval bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forecast {
    point: Vec<f64>,
    lower: Option<Vec<f64>>,
    upper: Option<Vec<f64>>,
}

impl Forecast {
    /// Point forecast only.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            point: values,
            lower: None,
            upper: None,
        }
    }

    /// Point forecast with interval bounds of the same length.
    pub fn from_values_with_intervals(
        values: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
    ) -> Result<Self> {
        for bound in [&lower, &upper] {
            if bound.len() != values.len() {
                return Err(ForecastError::DimensionMismatch {
                    expected: values.len(),
                    got: bound.len(),
                });
            }
        }
        Ok(Self {
            point: values,
            lower: Some(lower),
            upper: Some(upper),
        })
    }

    /// Number of forecast steps.
    pub fn horizon(&self) -> usize {
        self.point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point.is_empty()
    }

    pub fn point(&self) -> &[f64] {
        &self.point
    }

    pub fn lower(&self) -> Option<&[f64]> {
        self.lower.as_deref()
    }

    pub fn upper(&self) -> Option<&[f64]> {
        self.upper.as_deref()
    }

    pub fn has_intervals(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }

    /// Apply `f` to the point forecast and both bounds.
    ///
    /// `f` must be monotone increasing for the bounds to stay ordered.
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            point: self.point.into_iter().map(&f).collect(),
            lower: self.lower.map(|l| l.into_iter().map(&f).collect()),
            upper: self.upper.map(|u| u.into_iter().map(&f).collect()),
        }
    }

    /// Add a deterministic component step by step.
    pub fn shifted_by(self, offsets: &[f64]) -> Result<Self> {
        if offsets.len() != self.horizon() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.horizon(),
                got: offsets.len(),
            });
        }
        let add = |v: Vec<f64>| v.iter().zip(offsets).map(|(a, b)| a + b).collect::<Vec<_>>();
        Ok(Self {
            point: add(self.point),
            lower: self.lower.map(add),
            upper: self.upper.map(add),
        })
    }

    /// Drop the interval bounds.
    pub fn into_point(self) -> Vec<f64> {
        self.point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_only_forecast() {
        let f = Forecast::from_values(vec![1.0, 2.0, 3.0]);
        assert_eq!(f.horizon(), 3);
        assert!(!f.has_intervals());
        assert!(f.lower().is_none());
    }

    #[test]
    fn interval_lengths_must_match() {
        assert!(Forecast::from_values_with_intervals(vec![1.0], vec![0.0, 0.0], vec![2.0]).is_err());
        let f = Forecast::from_values_with_intervals(vec![1.0], vec![0.0], vec![2.0]).unwrap();
        assert!(f.has_intervals());
    }

    #[test]
    fn map_and_shift_keep_bounds_aligned() {
        let f = Forecast::from_values_with_intervals(vec![0.0, 1.0], vec![-1.0, 0.0], vec![1.0, 2.0])
            .unwrap()
            .map(f64::exp)
            .shifted_by(&[10.0, 20.0])
            .unwrap();
        assert_eq!(f.point()[0], 11.0);
        assert!(f.lower().unwrap()[1] < f.point()[1]);
        assert!(f.upper().unwrap()[1] > f.point()[1]);
        assert!(Forecast::from_values(vec![1.0]).shifted_by(&[]).is_err());
    }
}
