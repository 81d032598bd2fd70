//! STL: seasonal-trend decomposition by LOESS (Cleveland et al., 1990).
//!
//! Splits a series into trend, seasonal and remainder with
//! `y = trend + seasonal + remainder`.

use crate::utils::stats::variance;

/// Output of [`STL::decompose`].
#[derive(Debug, Clone)]
pub struct STLResult {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub remainder: Vec<f64>,
}

impl STLResult {
    /// `max(0, 1 - Var(R) / Var(S + R))`.
    pub fn seasonal_strength(&self) -> f64 {
        strength(&self.seasonal, &self.remainder)
    }

    /// `max(0, 1 - Var(R) / Var(T + R))`.
    pub fn trend_strength(&self) -> f64 {
        strength(&self.trend, &self.remainder)
    }
}

pub(crate) fn strength(component: &[f64], remainder: &[f64]) -> f64 {
    let combined: Vec<f64> = component.iter().zip(remainder).map(|(c, r)| c + r).collect();
    let var_c = variance(&combined);
    if !(var_c > 1e-12) {
        return 0.0;
    }
    (1.0 - variance(remainder) / var_c).clamp(0.0, 1.0)
}

/// STL decomposer for one integer period.
#[derive(Debug, Clone)]
pub struct STL {
    period: usize,
    seasonal_window: usize,
    trend_window: usize,
    low_pass_window: usize,
    inner_iterations: usize,
    outer_iterations: usize,
}

fn odd(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

impl STL {
    /// Decomposer for `period` with a seasonal window of 13.
    pub fn new(period: usize) -> Self {
        let period = period.max(2);
        let mut stl = Self {
            period,
            seasonal_window: 13,
            trend_window: 0,
            low_pass_window: odd(period + 1),
            inner_iterations: 2,
            outer_iterations: 0,
        };
        stl.trend_window = stl.default_trend_window();
        stl
    }

    fn default_trend_window(&self) -> usize {
        let ns = self.seasonal_window as f64;
        let nt = (1.5 * self.period as f64 / (1.0 - 1.5 / ns)).ceil() as usize;
        odd(nt.max(3))
    }

    /// Span of the cycle-subseries smoother, in cycles. Larger means a
    /// seasonal pattern that changes more slowly.
    pub fn with_seasonal_window(mut self, window: usize) -> Self {
        self.seasonal_window = odd(window.max(7));
        self.trend_window = self.default_trend_window();
        self
    }

    pub fn with_trend_window(mut self, window: usize) -> Self {
        self.trend_window = odd(window.max(3));
        self
    }

    /// Downweight outliers through bisquare robustness passes.
    pub fn robust(mut self) -> Self {
        self.outer_iterations = 6;
        self.inner_iterations = 1;
        self
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Decompose `series`; `None` below two full cycles.
    pub fn decompose(&self, series: &[f64]) -> Option<STLResult> {
        let n = series.len();
        if n < 2 * self.period {
            return None;
        }

        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];
        let mut robustness = vec![1.0; n];

        for outer in 0..=self.outer_iterations {
            for _ in 0..self.inner_iterations {
                let detrended: Vec<f64> = series.iter().zip(&trend).map(|(y, t)| y - t).collect();
                let cycle = self.smooth_subseries(&detrended, &robustness);
                let low = self.low_pass(&cycle);
                for i in 0..n {
                    seasonal[i] = cycle[i] - low[i];
                }
                let adjusted: Vec<f64> =
                    series.iter().zip(&seasonal).map(|(y, s)| y - s).collect();
                trend = loess(&adjusted, &robustness, self.trend_window);
            }
            if outer < self.outer_iterations {
                let remainder: Vec<f64> = (0..n).map(|i| series[i] - trend[i] - seasonal[i]).collect();
                robustness = bisquare_weights(&remainder);
            }
        }

        let remainder = (0..n).map(|i| series[i] - trend[i] - seasonal[i]).collect();
        Some(STLResult {
            trend,
            seasonal,
            remainder,
        })
    }

    fn smooth_subseries(&self, detrended: &[f64], robustness: &[f64]) -> Vec<f64> {
        let n = detrended.len();
        let mut out = vec![0.0; n];
        for phase in 0..self.period {
            let idx: Vec<usize> = (phase..n).step_by(self.period).collect();
            let values: Vec<f64> = idx.iter().map(|&i| detrended[i]).collect();
            let weights: Vec<f64> = idx.iter().map(|&i| robustness[i]).collect();
            let smoothed = loess(&values, &weights, self.seasonal_window);
            for (&i, s) in idx.iter().zip(smoothed) {
                out[i] = s;
            }
        }
        out
    }

    fn low_pass(&self, cycle: &[f64]) -> Vec<f64> {
        let ma = moving_average(&moving_average(&moving_average(cycle, self.period), self.period), 3);
        loess(&ma, &vec![1.0; ma.len()], self.low_pass_window)
    }
}

/// Centered moving average; the window shrinks at the edges.
fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let left = (window - 1) / 2;
    let right = window - 1 - left;
    let mut prefix = vec![0.0; n + 1];
    for i in 0..n {
        prefix[i + 1] = prefix[i] + values[i];
    }
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(left);
            let hi = (i + right + 1).min(n);
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

/// Local-linear LOESS with tricube weights over the `span` nearest points.
fn loess(values: &[f64], robustness: &[f64], span: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return values.to_vec();
    }
    let q = span.min(n).max(2);
    (0..n)
        .map(|i| {
            // window of q nearest neighbours around i
            let lo = i.saturating_sub(q / 2).min(n - q);
            let hi = lo + q;
            let reach = ((i - lo).max(hi - 1 - i) as f64).max(1.0) * 1.000_001
                + if span > n { (span - n) as f64 / 2.0 } else { 0.0 };

            let (mut sw, mut sx, mut sy, mut sxx, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for j in lo..hi {
                let u = (j as f64 - i as f64).abs() / reach;
                let w = (1.0 - u.powi(3)).max(0.0).powi(3) * robustness[j];
                let x = j as f64 - i as f64;
                sw += w;
                sx += w * x;
                sy += w * values[j];
                sxx += w * x * x;
                sxy += w * x * values[j];
            }
            if sw <= 0.0 {
                return values[i];
            }
            let mx = sx / sw;
            let my = sy / sw;
            let denom = sxx - sw * mx * mx;
            if denom.abs() < 1e-12 * sw.max(1.0) {
                my
            } else {
                // evaluated at x = 0, the target point
                my - (sxy - sw * mx * my) / denom * mx
            }
        })
        .collect()
}

fn bisquare_weights(remainder: &[f64]) -> Vec<f64> {
    let mut abs: Vec<f64> = remainder.iter().map(|r| r.abs()).collect();
    abs.sort_by(|a, b| a.total_cmp(b));
    let n = abs.len();
    let median = if n % 2 == 0 {
        (abs[n / 2 - 1] + abs[n / 2]) / 2.0
    } else {
        abs[n / 2]
    };
    let h = 6.0 * median;
    remainder
        .iter()
        .map(|r| {
            if h <= 1e-12 {
                return 1.0;
            }
            let u = r.abs() / h;
            if u < 1.0 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn weekly(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 0.2 * i as f64 + 10.0 * (2.0 * PI * i as f64 / 7.0).sin())
            .collect()
    }

    #[test]
    fn components_add_back_to_series() {
        let y = weekly(140);
        let r = STL::new(7).decompose(&y).unwrap();
        for i in 0..y.len() {
            assert_relative_eq!(r.trend[i] + r.seasonal[i] + r.remainder[i], y[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn recovers_weekly_pattern() {
        let y = weekly(210);
        let r = STL::new(7).decompose(&y).unwrap();
        assert!(r.seasonal_strength() > 0.9);
        // away from the edges the trend is the straight line
        for i in 30..180 {
            assert!((r.trend[i] - (100.0 + 0.2 * i as f64)).abs() < 1.0, "i = {i}");
        }
    }

    #[test]
    fn needs_two_cycles() {
        assert!(STL::new(7).decompose(&weekly(13)).is_none());
        assert!(STL::new(7).decompose(&weekly(14)).is_some());
    }

    #[test]
    fn robust_pass_limits_outlier_damage() {
        let mut y = weekly(140);
        y[70] += 500.0;
        let r = STL::new(7).robust().decompose(&y).unwrap();
        assert!(r.remainder[70] > 300.0);
    }

    #[test]
    fn loess_reproduces_a_line() {
        let y: Vec<f64> = (0..50).map(|i| 3.0 + 0.5 * i as f64).collect();
        let s = loess(&y, &vec![1.0; 50], 11);
        for (a, b) in y.iter().zip(&s) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }
}
