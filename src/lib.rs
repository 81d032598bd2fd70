//! # load-forecast
//!
//! Daily electricity load forecasting for a one-month target window.
//!
//! The daily load series carries a weekly and a yearly cycle. A bank of
//! multi-seasonal models (STL+ETS, ARIMA with Fourier regressors, TBATS,
//! NNAR, seasonal naive and a seasonal ARIMA) is fitted on all but the last
//! year, scored on that year, and the chosen models are refitted on the full
//! series to write one submission file each.
//!
//! The stages live in [`pipeline`]; [`pipeline::run`] chains them under a
//! [`config::PipelineConfig`].

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::manual_memcpy)]

pub mod cache;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod seasonality;
pub mod telemetry;
pub mod transform;
pub mod utils;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::core::{Forecast, TimeSeries, TimeSeriesBuilder};
    pub use crate::error::{ForecastError, Result};
    pub use crate::models::{fit, fit_all, Forecaster, ModelConfig};
    pub use crate::pipeline::{accuracy, rank, split, Leaderboard, Submission};
    pub use crate::utils::{calculate_metrics, quantile_normal, AccuracyMetrics};
}
