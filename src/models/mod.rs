//! Forecasting models.
//!
//! Every model implements [`Forecaster`]. The [`bank`] module maps the
//! serializable [`ModelConfig`] of each evaluated variant onto these types.

mod traits;

pub mod arima;
pub mod bank;
pub mod baseline;
pub mod exponential;
pub mod fourier_arima;
pub mod nnar;
pub mod stl_ets;
pub mod tbats;

pub use arima::{AutoARIMA, ModelOrder, SARIMA};
pub use bank::{fit, fit_all, BankRun, FitError, FittedModel, ModelConfig};
pub use baseline::SeasonalNaive;
pub use fourier_arima::FourierArima;
pub use nnar::NNAR;
pub use stl_ets::StlEts;
pub use tbats::{AutoTBATS, TBATS};
pub use traits::{BoxedForecaster, Forecaster};
