//! Differencing utilities for ARIMA models.

/// Apply `d` rounds of first differencing.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= 1 {
            return Vec::new();
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Apply `d` rounds of lag-`period` differencing.
pub fn seasonal_difference(series: &[f64], d: usize, period: usize) -> Vec<f64> {
    if period == 0 {
        return series.to_vec();
    }
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= period {
            return Vec::new();
        }
        result = result
            .iter()
            .skip(period)
            .zip(result.iter())
            .map(|(curr, prev)| curr - prev)
            .collect();
    }
    result
}

/// Coefficients of `(1 - B)^d (1 - B^period)^cap_d`, lag 0 first.
pub fn differencing_polynomial(d: usize, cap_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = multiply(&poly, &[1.0, -1.0]);
    }
    if period > 0 {
        let mut seasonal = vec![0.0; period + 1];
        seasonal[0] = 1.0;
        seasonal[period] = -1.0;
        for _ in 0..cap_d {
            poly = multiply(&poly, &seasonal);
        }
    }
    poly
}

/// Product of two lag polynomials.
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Continue a series whose differences are known.
///
/// `poly` is a differencing polynomial from [`differencing_polynomial`],
/// `history` the undifferenced values so far and `future_diffs` the
/// differenced values to undo.
pub fn integrate(future_diffs: &[f64], history: &[f64], poly: &[f64]) -> Vec<f64> {
    let order = poly.len().saturating_sub(1);
    let mut extended = history.to_vec();
    for &w in future_diffs {
        let t = extended.len();
        let mut x = w;
        for i in 1..=order.min(t) {
            x -= poly[i] * extended[t - i];
        }
        extended.push(x);
    }
    extended.split_off(history.len())
}

/// 5% critical value of the level-stationarity KPSS test.
pub const KPSS_CRITICAL_5PCT: f64 = 0.463;

/// KPSS level-stationarity statistic with a Bartlett long-run variance
/// over `trunc(4 (n/100)^(1/4))` lags.
pub fn kpss_statistic(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 3 {
        return 0.0;
    }
    let mean = series.iter().sum::<f64>() / n as f64;
    let e: Vec<f64> = series.iter().map(|v| v - mean).collect();

    let mut partial = 0.0;
    let mut eta = 0.0;
    for v in &e {
        partial += v;
        eta += partial * partial;
    }

    let lags = (4.0 * (n as f64 / 100.0).powf(0.25)).trunc() as usize;
    let mut lrv = e.iter().map(|v| v * v).sum::<f64>() / n as f64;
    for l in 1..=lags.min(n - 1) {
        let gamma = (l..n).map(|t| e[t] * e[t - l]).sum::<f64>() / n as f64;
        lrv += 2.0 * (1.0 - l as f64 / (lags + 1) as f64) * gamma;
    }
    if lrv <= 0.0 {
        return 0.0;
    }
    eta / (n as f64 * n as f64 * lrv)
}

/// Number of first differences (at most `max_d`) after which the KPSS test
/// no longer rejects level stationarity at 5%.
pub fn ndiffs(series: &[f64], max_d: usize) -> usize {
    let mut current = series.to_vec();
    for d in 0..max_d {
        if current.len() < 3 || kpss_statistic(&current) <= KPSS_CRITICAL_5PCT {
            return d;
        }
        current = difference(&current, 1);
    }
    max_d
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn difference_order_1() {
        let series = vec![1.0, 3.0, 6.0, 10.0, 15.0];
        assert_eq!(difference(&series, 1), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(difference(&series, 2), vec![1.0, 1.0, 1.0]);
        assert_eq!(difference(&series, 0), series);
    }

    #[test]
    fn difference_empty() {
        assert!(difference(&[], 1).is_empty());
    }

    #[test]
    fn seasonal_difference_weekly() {
        let series: Vec<f64> = (0..14).map(|i| (i % 7) as f64 + if i >= 7 { 10.0 } else { 0.0 }).collect();
        assert_eq!(seasonal_difference(&series, 1, 7), vec![10.0; 7]);
    }

    #[test]
    fn polynomial_of_combined_differencing() {
        // (1 - B)(1 - B^2) = 1 - B - B^2 + B^3
        assert_eq!(differencing_polynomial(1, 1, 2), vec![1.0, -1.0, -1.0, 1.0]);
        assert_eq!(differencing_polynomial(0, 0, 7), vec![1.0]);
    }

    #[test]
    fn integrate_reverses_first_difference() {
        let original = vec![10.0, 12.0, 15.0, 19.0, 24.0];
        let poly = differencing_polynomial(1, 0, 0);
        let out = integrate(&[6.0, 7.0], &original, &poly);
        assert_relative_eq!(out[0], 30.0);
        assert_relative_eq!(out[1], 37.0);
    }

    #[test]
    fn integrate_reverses_seasonal_difference() {
        let history: Vec<f64> = (0..14).map(|i| ((i * 5) % 7) as f64).collect();
        let poly = differencing_polynomial(0, 1, 7);
        let out = integrate(&[1.0; 7], &history, &poly);
        for k in 0..7 {
            assert_relative_eq!(out[k], history[7 + k] + 1.0);
        }
    }

    #[test]
    fn kpss_separates_level_and_trend() {
        let cycle: Vec<f64> = (0..100).map(|i| ((i * 37) % 11) as f64).collect();
        assert!(kpss_statistic(&cycle) < KPSS_CRITICAL_5PCT);
        assert_eq!(ndiffs(&cycle, 2), 0);

        let trend: Vec<f64> = (0..100).map(|i| 10.0 + 2.0 * i as f64 + (i % 3) as f64).collect();
        assert!(kpss_statistic(&trend) > KPSS_CRITICAL_5PCT);
        assert_eq!(ndiffs(&trend, 2), 1);
    }

    #[test]
    fn constant_series_needs_no_difference() {
        assert_eq!(kpss_statistic(&[4.0; 30]), 0.0);
        assert_eq!(ndiffs(&[4.0; 30], 2), 0);
    }
}
