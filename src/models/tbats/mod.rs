//! TBATS: trigonometric seasonality, Box-Cox transformation, ARMA errors,
//! trend and seasonal components (De Livera, Hyndman & Snyder, 2011).
//!
//! Seasonal periods may be non-integer, which makes the model a natural fit
//! for a yearly cycle of 365.25 days alongside the weekly one.

mod auto;
mod model;

pub use auto::{select_harmonics, AutoTBATS, AutoTBATSConfig};
pub use model::TBATS;
