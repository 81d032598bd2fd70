//! Exponential smoothing for seasonally adjusted series.
//!
//! - ETS: non-seasonal error/trend state-space models
//! - AutoETS: information-criterion selection among them

mod auto_ets;
mod ets;

pub use auto_ets::{AutoETS, AutoETSConfig, SelectionCriterion};
pub use ets::{ETSSpec, ErrorType, TrendType, ETS};
