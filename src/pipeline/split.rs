//! Hold-out split for evaluation.

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};

/// Training = the first `N - h` observations, test = the last `h`.
///
/// Both halves keep the series' seasonal periods.
pub fn split(series: &TimeSeries, h: usize) -> Result<(TimeSeries, TimeSeries)> {
    let n = series.len();
    if h == 0 || h >= n {
        return Err(ForecastError::InvalidParameter(format!(
            "hold-out horizon {h} must be in 1..{n}"
        )));
    }
    let cut = n - h;
    Ok((series.slice(0, cut)?, series.slice(cut, n)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(n: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2006, 1, 1).unwrap();
        TimeSeries::daily(start, (0..n).map(|i| i as f64).collect()).unwrap()
    }

    #[test]
    fn test_is_the_tail() {
        let s = series(30);
        let (train, test) = split(&s, 7).unwrap();
        assert_eq!(train.len(), 23);
        assert_eq!(test.len(), 7);
        assert_eq!(test.values()[0], 23.0);
        assert_eq!(test.start_date(), train.future_dates(1)[0]);
        assert_eq!(train.seasonal_periods(), s.seasonal_periods());
    }

    #[test]
    fn degenerate_horizons_are_rejected() {
        let s = series(10);
        assert!(matches!(split(&s, 0), Err(ForecastError::InvalidParameter(_))));
        assert!(matches!(split(&s, 10), Err(ForecastError::InvalidParameter(_))));
        assert!(split(&s, 9).is_ok());
    }
}
