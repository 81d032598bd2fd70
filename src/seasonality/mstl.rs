//! MSTL: STL extended to several seasonal periods (Bandara et al., 2021).
//!
//! Each seasonal component is re-estimated in turn with the others removed,
//! shortest period first, and the trend comes from the final STL pass.

use super::stl::{strength, STL};

/// Output of [`MSTL::decompose`].
#[derive(Debug, Clone)]
pub struct MSTLResult {
    pub trend: Vec<f64>,
    /// One component per entry of `seasonal_periods`.
    pub seasonal_components: Vec<Vec<f64>>,
    pub seasonal_periods: Vec<usize>,
    pub remainder: Vec<f64>,
}

impl MSTLResult {
    /// Sum of all seasonal components.
    pub fn total_seasonal(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.trend.len()];
        for component in &self.seasonal_components {
            for (t, c) in total.iter_mut().zip(component) {
                *t += c;
            }
        }
        total
    }

    /// Trend plus remainder: the series with every seasonal component removed.
    pub fn seasonally_adjusted(&self) -> Vec<f64> {
        self.trend
            .iter()
            .zip(&self.remainder)
            .map(|(t, r)| t + r)
            .collect()
    }

    pub fn seasonal_strength(&self, index: usize) -> Option<f64> {
        self.seasonal_components
            .get(index)
            .map(|s| strength(s, &self.remainder))
    }

    pub fn trend_strength(&self) -> f64 {
        strength(&self.trend, &self.remainder)
    }
}

/// Multi-period decomposer.
#[derive(Debug, Clone)]
pub struct MSTL {
    seasonal_periods: Vec<usize>,
    iterations: usize,
    robust: bool,
}

impl MSTL {
    /// Periods are sorted and deduplicated; periods below 2 are dropped.
    pub fn new(seasonal_periods: Vec<usize>) -> Self {
        let mut periods: Vec<usize> = seasonal_periods.into_iter().filter(|p| *p >= 2).collect();
        periods.sort_unstable();
        periods.dedup();
        Self {
            seasonal_periods: periods,
            iterations: 2,
            robust: false,
        }
    }

    pub fn with_iterations(mut self, n: usize) -> Self {
        self.iterations = n.max(1);
        self
    }

    pub fn robust(mut self) -> Self {
        self.robust = true;
        self
    }

    pub fn seasonal_periods(&self) -> &[usize] {
        &self.seasonal_periods
    }

    /// Keep only the periods with at least two full cycles in `n` points.
    pub fn fitting(mut self, n: usize) -> Self {
        self.seasonal_periods.retain(|p| 2 * p <= n);
        self
    }

    /// Decompose `series`. `None` when no period is set or the longest
    /// period does not fit twice.
    pub fn decompose(&self, series: &[f64]) -> Option<MSTLResult> {
        let n = series.len();
        let longest = *self.seasonal_periods.last()?;
        if n < 2 * longest {
            return None;
        }

        let mut components = vec![vec![0.0; n]; self.seasonal_periods.len()];
        let mut deseasonalized = series.to_vec();
        let mut trend = vec![0.0; n];

        for _ in 0..self.iterations {
            for (k, &period) in self.seasonal_periods.iter().enumerate() {
                for i in 0..n {
                    deseasonalized[i] += components[k][i];
                }
                // seasonal window grows with the period index
                let stl = STL::new(period).with_seasonal_window(7 + 4 * (k + 1));
                let stl = if self.robust { stl.robust() } else { stl };
                let fit = stl.decompose(&deseasonalized)?;
                for i in 0..n {
                    deseasonalized[i] -= fit.seasonal[i];
                }
                components[k] = fit.seasonal;
                trend = fit.trend;
            }
        }

        let remainder = (0..n)
            .map(|i| deseasonalized[i] - trend[i])
            .collect();

        Some(MSTLResult {
            trend,
            seasonal_components: components,
            seasonal_periods: self.seasonal_periods.clone(),
            remainder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn two_seasons(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                500.0 + 0.05 * t
                    + 20.0 * (2.0 * PI * t / 7.0).sin()
                    + 60.0 * (2.0 * PI * t / 91.0).cos()
            })
            .collect()
    }

    #[test]
    fn components_add_back_to_series() {
        let y = two_seasons(400);
        let r = MSTL::new(vec![91, 7]).decompose(&y).unwrap();
        assert_eq!(r.seasonal_periods, vec![7, 91]);
        let seasonal = r.total_seasonal();
        for i in 0..y.len() {
            assert_relative_eq!(r.trend[i] + seasonal[i] + r.remainder[i], y[i], epsilon = 1e-8);
        }
    }

    #[test]
    fn both_seasons_are_strong() {
        let y = two_seasons(546);
        let r = MSTL::new(vec![7, 91]).decompose(&y).unwrap();
        assert!(r.seasonal_strength(0).unwrap() > 0.8);
        assert!(r.seasonal_strength(1).unwrap() > 0.8);
        assert!(r.seasonal_strength(2).is_none());
    }

    #[test]
    fn drops_periods_that_do_not_fit() {
        let m = MSTL::new(vec![7, 365]).fitting(400);
        assert_eq!(m.seasonal_periods(), &[7]);
        assert!(MSTL::new(vec![]).decompose(&[1.0; 10]).is_none());
        assert!(MSTL::new(vec![7, 365]).decompose(&two_seasons(400)).is_none());
    }
}
