//! Data transformations for time series.
//!
//! Provides Box-Cox transforms and Fourier seasonal regressors.
//!
//! # Example
//!
//! ```
//! use load_forecast::transform::{BoxCox, FourierTerms};
//!
//! let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
//! let log = BoxCox::log();
//! let y = log.transform(&series).unwrap();
//! assert!((log.inverse(&y)[4] - 5.0).abs() < 1e-12);
//!
//! let terms = FourierTerms::new(&[7.0, 365.25], &[2, 4]).unwrap();
//! assert_eq!(terms.generate(0, 10).unwrap().width(), 12);
//! ```

pub mod boxcox;
pub mod fourier;

pub use boxcox::{boxcox, boxcox_lambda, inv_boxcox, BoxCox};
pub use fourier::FourierTerms;
