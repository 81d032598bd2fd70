//! Fourier terms for long or non-integer seasonal periods.
//!
//! Harmonic `k` of period `m` at time `t` is the pair
//! `sin(2πkt/m)`, `cos(2πkt/m)`. Time is counted from the first training
//! observation, so the same [`FourierTerms`] generates in-sample columns
//! (`offset = 0`) and future columns (`offset = n`).

use crate::error::{ForecastError, Result};
use crate::utils::ols::Regressors;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Seasonal periods paired with their harmonic counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FourierTerms {
    periods: Vec<f64>,
    harmonics: Vec<usize>,
}

impl FourierTerms {
    /// `harmonics[i]` sin/cos pairs for `periods[i]`.
    ///
    /// Each count must satisfy `1 <= K <= m / 2`.
    pub fn new(periods: &[f64], harmonics: &[usize]) -> Result<Self> {
        if periods.len() != harmonics.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: periods.len(),
                got: harmonics.len(),
            });
        }
        for (&m, &k) in periods.iter().zip(harmonics) {
            if m <= 1.0 || !m.is_finite() {
                return Err(ForecastError::InvalidParameter(format!(
                    "seasonal period must exceed 1, got {m}"
                )));
            }
            if k == 0 || 2.0 * k as f64 > m {
                return Err(ForecastError::InvalidParameter(format!(
                    "harmonic count {k} out of range for period {m}"
                )));
            }
        }
        Ok(Self {
            periods: periods.to_vec(),
            harmonics: harmonics.to_vec(),
        })
    }

    pub fn periods(&self) -> &[f64] {
        &self.periods
    }

    pub fn harmonics(&self) -> &[usize] {
        &self.harmonics
    }

    /// Number of regressor columns produced.
    pub fn width(&self) -> usize {
        self.pairs().map(|(_, _, has_sin)| if has_sin { 2 } else { 1 }).sum()
    }

    /// `(period, k, has_sin)` per harmonic. The sine of `k = m/2` vanishes
    /// on the integers and is left out.
    fn pairs(&self) -> impl Iterator<Item = (f64, usize, bool)> + '_ {
        self.periods
            .iter()
            .zip(&self.harmonics)
            .flat_map(|(&m, &kmax)| {
                (1..=kmax).map(move |k| (m, k, (2.0 * k as f64 - m).abs() > 1e-9))
            })
    }

    /// Columns for `rows` consecutive time steps starting at `offset`.
    ///
    /// With no periods the design has `rows` rows and no columns.
    pub fn generate(&self, offset: usize, rows: usize) -> Result<Regressors> {
        let mut out = Regressors::with_rows(rows);
        for (m, k, has_sin) in self.pairs() {
            let omega = 2.0 * PI * k as f64 / m;
            if has_sin {
                let s = (offset..offset + rows)
                    .map(|t| (omega * t as f64).sin())
                    .collect();
                out.push(format!("S{k}-{m}"), s)?;
            }
            let c = (offset..offset + rows)
                .map(|t| (omega * t as f64).cos())
                .collect();
            out.push(format!("C{k}-{m}"), c)?;
        }
        Ok(out)
    }

    /// Single row of the columns at time `t`, in [`generate`](Self::generate) order.
    pub fn row(&self, t: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.width());
        for (m, k, has_sin) in self.pairs() {
            let angle = 2.0 * PI * k as f64 / m * t as f64;
            if has_sin {
                out.push(angle.sin());
            }
            out.push(angle.cos());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn column_count_matches_harmonics() {
        let f = FourierTerms::new(&[7.0, 365.25], &[2, 4]).unwrap();
        assert_eq!(f.width(), 12);
        let x = f.generate(0, 30).unwrap();
        assert_eq!(x.width(), 12);
        assert_eq!(x.rows(), 30);
    }

    #[test]
    fn nyquist_harmonic_drops_sine() {
        let f = FourierTerms::new(&[4.0], &[2]).unwrap();
        assert_eq!(f.width(), 3);
        assert_eq!(f.generate(0, 8).unwrap().names(), &["S1-4", "C1-4", "C2-4"]);
    }

    #[test]
    fn future_block_continues_in_sample_block() {
        let f = FourierTerms::new(&[7.0, 365.25], &[3, 2]).unwrap();
        let all = f.generate(0, 400).unwrap();
        let tail = f.generate(390, 10).unwrap();
        for (c_all, c_tail) in all.columns().iter().zip(tail.columns()) {
            for i in 0..10 {
                assert_relative_eq!(c_all[390 + i], c_tail[i], epsilon = 1e-12);
            }
        }
        assert_eq!(f.row(395), all.row(395));
    }

    #[test]
    fn weekly_terms_repeat_every_week() {
        let f = FourierTerms::new(&[7.0], &[3]).unwrap();
        for (a, b) in f.row(3).iter().zip(f.row(10)) {
            assert_relative_eq!(*a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn no_periods_keeps_the_row_count() {
        let f = FourierTerms::new(&[], &[]).unwrap();
        let x = f.generate(10, 31).unwrap();
        assert_eq!(x.width(), 0);
        assert_eq!(x.rows(), 31);
    }

    #[test]
    fn rejects_too_many_harmonics() {
        assert!(FourierTerms::new(&[7.0], &[4]).is_err());
        assert!(FourierTerms::new(&[7.0], &[0]).is_err());
        assert!(FourierTerms::new(&[7.0, 365.25], &[2]).is_err());
    }
}
