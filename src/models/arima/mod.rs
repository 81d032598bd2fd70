//! ARIMA family.
//!
//! - [`SARIMA`]: seasonal ARIMA with optional mean or drift, fitted by
//!   conditional sum of squares
//! - [`AutoARIMA`]: automatic non-seasonal order selection

mod auto_arima;
mod diff;
mod model;

pub use auto_arima::{AutoARIMA, AutoARIMAConfig};
pub use diff::{difference, differencing_polynomial, kpss_statistic, ndiffs, seasonal_difference};
pub use model::{Constant, ModelOrder, SARIMA};
pub(crate) use model::{is_invertible, is_stationary};
