//! Benchmark models.

mod seasonal_naive;

pub use seasonal_naive::SeasonalNaive;
