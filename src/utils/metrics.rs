//! Point-forecast accuracy measures.

use crate::error::{ForecastError, Result};

/// Accuracy of a forecast against the values it tried to predict.
///
/// Percentage measures are `None` when any actual value is zero. MASE is
/// `None` when no in-sample history was given or its naive error is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyMetrics {
    /// Mean error (bias).
    pub me: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Mean absolute error.
    pub mae: f64,
    /// Mean percentage error.
    pub mpe: Option<f64>,
    /// Mean absolute percentage error.
    pub mape: Option<f64>,
    /// Symmetric mean absolute percentage error.
    pub smape: f64,
    /// Mean absolute scaled error.
    pub mase: Option<f64>,
}

/// Compute [`AccuracyMetrics`] for `predicted` against `actual`.
///
/// `history` is the in-sample series used to scale MASE with a seasonal
/// naive benchmark of period `season`.
pub fn calculate_metrics(
    actual: &[f64],
    predicted: &[f64],
    history: Option<&[f64]>,
    season: usize,
) -> Result<AccuracyMetrics> {
    if actual.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if actual.len() != predicted.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }

    let n = actual.len() as f64;
    let errors: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| a - p)
        .collect();

    let me = errors.iter().sum::<f64>() / n;
    let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt();
    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

    let (mpe, mape) = if actual.contains(&0.0) {
        (None, None)
    } else {
        let pct: Vec<f64> = errors
            .iter()
            .zip(actual)
            .map(|(e, a)| 100.0 * e / a)
            .collect();
        (
            Some(pct.iter().sum::<f64>() / n),
            Some(pct.iter().map(|p| p.abs()).sum::<f64>() / n),
        )
    };

    let smape = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| {
            let denom = a.abs() + p.abs();
            if denom == 0.0 {
                0.0
            } else {
                200.0 * (a - p).abs() / denom
            }
        })
        .sum::<f64>()
        / n;

    let mase = history
        .and_then(|h| seasonal_naive_mae(h, season))
        .map(|scale| mae / scale);

    Ok(AccuracyMetrics {
        me,
        rmse,
        mae,
        mpe,
        mape,
        smape,
        mase,
    })
}

/// In-sample MAE of the seasonal naive forecast, the MASE denominator.
pub fn seasonal_naive_mae(history: &[f64], season: usize) -> Option<f64> {
    let season = season.max(1);
    if history.len() <= season {
        return None;
    }
    let diffs = history.len() - season;
    let scale = (season..history.len())
        .map(|i| (history[i] - history[i - season]).abs())
        .sum::<f64>()
        / diffs as f64;
    (scale > 0.0).then_some(scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perfect_forecast_has_zero_error() {
        let actual = [10.0, 12.0, 11.0, 13.0, 14.0];
        let m = calculate_metrics(&actual, &actual, None, 7).unwrap();
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mape, Some(0.0));
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.smape, 0.0);
    }

    #[test]
    fn known_values() {
        let actual = [100.0, 200.0];
        let predicted = [110.0, 180.0];
        let m = calculate_metrics(&actual, &predicted, None, 7).unwrap();
        assert_relative_eq!(m.me, 5.0);
        assert_relative_eq!(m.mae, 15.0);
        assert_relative_eq!(m.rmse, (250.0f64).sqrt());
        assert_relative_eq!(m.mape.unwrap(), 10.0);
        assert_relative_eq!(m.mpe.unwrap(), 0.0);
    }

    #[test]
    fn percentage_errors_need_nonzero_actuals() {
        let m = calculate_metrics(&[0.0, 1.0], &[1.0, 1.0], None, 7).unwrap();
        assert!(m.mape.is_none());
        assert!(m.mpe.is_none());
    }

    #[test]
    fn mase_scales_by_seasonal_naive() {
        let history: Vec<f64> = (0..14).map(|i| i as f64).collect();
        // seasonal naive with period 7 always misses by 7
        let m = calculate_metrics(&[20.0], &[13.0], Some(&history), 7).unwrap();
        assert_relative_eq!(m.mase.unwrap(), 1.0);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = calculate_metrics(&[1.0, 2.0], &[1.0], None, 7).unwrap_err();
        assert_eq!(
            err,
            ForecastError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        );
        assert_eq!(
            calculate_metrics(&[], &[], None, 7).unwrap_err(),
            ForecastError::EmptyData
        );
    }
}
