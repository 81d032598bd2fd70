//! Core data structures: the daily series and forecast results.

mod forecast;
mod time_series;

pub use forecast::Forecast;
pub use time_series::{TimeSeries, TimeSeriesBuilder, DAILY_SEASONALITY};
