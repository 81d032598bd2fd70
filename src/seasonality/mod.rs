//! Seasonal-trend decomposition.
//!
//! Used by the STL+ETS forecaster and by the diagnostic report; no other
//! model depends on it.

mod mstl;
mod stl;

pub use mstl::{MSTLResult, MSTL};
pub use stl::{STLResult, STL};
