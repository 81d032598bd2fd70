//! Error types for the forecasting core.
//!
//! I/O-facing components (loader, cache, submission writer) carry their own
//! error enums and wrap [`ForecastError`] where a model is involved.

use thiserror::Error;

/// Result type alias for forecasting operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors raised by series construction, model fitting and evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Two sequences that must align do not.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Dates are out of order, duplicated or not contiguous.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// Non-finite values where a complete series is required.
    #[error("missing values detected in data")]
    MissingValues,

    /// Index out of bounds.
    #[error("index out of bounds: {index} (size: {size})")]
    IndexOutOfBounds { index: usize, size: usize },

    /// Numerical failure during estimation.
    #[error("computation error: {0}")]
    ComputationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        assert_eq!(ForecastError::EmptyData.to_string(), "empty input data");

        let err = ForecastError::InsufficientData { needed: 730, got: 400 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 730, got 400"
        );

        let err = ForecastError::TimestampError("gap after 2010-03-01".to_string());
        assert_eq!(err.to_string(), "timestamp error: gap after 2010-03-01");

        let err = ForecastError::DimensionMismatch {
            expected: 365,
            got: 31,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 365, got 31");

        assert_eq!(
            ForecastError::FitRequired.to_string(),
            "model must be fitted before prediction"
        );
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = ForecastError::InvalidParameter("k".into());
        let err2 = err1.clone();
        assert_eq!(err1, err2);
        assert_ne!(err1, ForecastError::MissingValues);
    }
}
