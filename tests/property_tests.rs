//! Property-based tests for the evaluation workflow.
//!
//! These tests verify invariants that should hold for all valid inputs,
//! using randomly generated daily series.

use chrono::NaiveDate;
use load_forecast::core::TimeSeries;
use load_forecast::models::arima::AutoARIMAConfig;
use load_forecast::models::{FourierArima, Forecaster, SeasonalNaive};
use load_forecast::pipeline::{accuracy, split};
use proptest::prelude::*;

/// Daily series starting 2006-01-01.
fn make_ts(values: &[f64]) -> TimeSeries {
    let start = NaiveDate::from_ymd_opt(2006, 1, 1).unwrap();
    TimeSeries::daily(start, values.to_vec()).unwrap()
}

/// Strictly positive values, like daily load.
fn load_values_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| prop::collection::vec(100.0..5000.0_f64, len))
}

/// Weekly-seasonal series with a trend and deterministic jitter.
fn weekly_values_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| {
        (500.0..1500.0_f64, 20.0..200.0_f64, -0.5..0.5_f64).prop_map(move |(base, amplitude, slope)| {
            (0..len)
                .map(|i| {
                    let t = i as f64;
                    base + slope * t
                        + amplitude * (2.0 * std::f64::consts::PI * t / 7.0).sin()
                        + ((i * 37) % 11) as f64
                })
                .collect()
        })
    })
}

// =============================================================================
// Property: the hold-out split partitions the series
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn split_partitions_the_series(
        values in load_values_strategy(2, 400),
        h_frac in 0.0..1.0_f64
    ) {
        let ts = make_ts(&values);
        let h = 1 + ((ts.len() - 1) as f64 * h_frac) as usize;
        let h = h.min(ts.len() - 1);
        let (train, test) = split(&ts, h).unwrap();

        prop_assert_eq!(train.len() + test.len(), ts.len());
        prop_assert_eq!(test.len(), h);
        prop_assert_eq!(train.values(), &values[..train.len()]);
        prop_assert_eq!(test.values(), &values[train.len()..]);
        prop_assert_eq!(train.future_dates(h), test.dates().to_vec());
    }
}

// =============================================================================
// Property: seasonal naive repeats the last cycle
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn seasonal_naive_repeats_one_cycle_earlier(
        values in load_values_strategy(30, 200),
        period in prop::sample::select(vec![7usize, 14, 28]),
        horizon in 1usize..60
    ) {
        let ts = make_ts(&values);
        let mut model = SeasonalNaive::new(period);
        model.fit(&ts).unwrap();
        let forecast = model.predict(horizon).unwrap();
        prop_assert_eq!(forecast.horizon(), horizon);

        let n = values.len();
        for (k, f) in forecast.point().iter().enumerate() {
            // only the first cycle has an observation exactly one period back
            if k < period {
                prop_assert_eq!(*f, values[n + k - period]);
            } else {
                prop_assert_eq!(*f, forecast.point()[k - period]);
            }
        }
    }
}

// =============================================================================
// Property: accuracy measures are non-negative; RMSE is zero only on a match
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn accuracy_measures_are_non_negative(
        actual in load_values_strategy(1, 60),
        noise in prop::collection::vec(-50.0..50.0_f64, 60),
        train in load_values_strategy(10, 40)
    ) {
        let forecast: Vec<f64> = actual.iter().zip(&noise).map(|(a, e)| a + e).collect();
        let acc = accuracy(&actual, &forecast, &train).unwrap();

        prop_assert!(acc.rmse >= 0.0);
        prop_assert!(acc.mae >= 0.0);
        prop_assert!(acc.smape >= 0.0);
        prop_assert!(acc.mape.unwrap() >= 0.0);
        if let Some(mase) = acc.mase {
            prop_assert!(mase >= 0.0);
        }
        prop_assert!(acc.rmse >= acc.mae - 1e-9);

        let exact = forecast == actual;
        prop_assert_eq!(acc.rmse == 0.0, exact);
    }

    #[test]
    fn identical_forecast_has_zero_error(actual in load_values_strategy(1, 60)) {
        let acc = accuracy(&actual, &actual, &actual).unwrap();
        prop_assert_eq!(acc.rmse, 0.0);
        prop_assert_eq!(acc.mape, Some(0.0));
        prop_assert_eq!(acc.smape, 0.0);
    }
}

// =============================================================================
// Property: Fourier order does not change the forecast length
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(4))]

    #[test]
    fn fourier_arima_length_independent_of_k(
        values in weekly_values_strategy(120, 200),
        horizon in 1usize..40
    ) {
        // a monthly second period keeps every harmonic identifiable
        let ts = make_ts(&values).with_seasonal_periods(vec![7.0, 30.0]).unwrap();
        let mut lengths = Vec::new();
        for k in [2, 12] {
            let mut model = FourierArima::new(vec![2, k])
                .with_arima_config(AutoARIMAConfig::default().with_max_orders(1, 1, 1));
            model.fit(&ts).unwrap();
            lengths.push(model.predict(horizon).unwrap().horizon());
        }
        prop_assert_eq!(lengths, vec![horizon, horizon]);
    }
}

#[test]
fn five_day_window_example() {
    let actual = [10.0, 12.0, 11.0, 13.0, 14.0];
    let acc = accuracy(&actual, &actual, &[9.0; 10]).unwrap();
    assert_eq!(acc.rmse, 0.0);
    assert_eq!(acc.mape, Some(0.0));
}
