//! The model bank: configurations, one fit routine, fitted handles.
//!
//! Every model is described by a [`ModelConfig`]. [`fit`] turns a
//! configuration and a training series into a [`FittedModel`];
//! [`fit_all`] runs it over a list and keeps going when one model fails.

use crate::cache::{CacheError, CacheKey, ModelCache};
use crate::core::{Forecast, TimeSeries};
use crate::error::ForecastError;
use crate::models::arima::{Constant, ModelOrder, SARIMA};
use crate::models::baseline::SeasonalNaive;
use crate::models::fourier_arima::FourierArima;
use crate::models::nnar::NNAR;
use crate::models::stl_ets::StlEts;
use crate::models::tbats::AutoTBATS;
use crate::models::{BoxedForecaster, Forecaster};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from fitting one bank entry.
#[derive(Debug, Error)]
pub enum FitError {
    #[error(transparent)]
    Model(#[from] ForecastError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// One entry of the model bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    /// MSTL decomposition with ETS on the adjusted series.
    StlEts,
    /// Regression on `harmonics[i]` Fourier pairs per seasonal period with
    /// automatic ARIMA errors.
    FourierArima {
        harmonics: Vec<usize>,
        #[serde(default = "default_true")]
        log: bool,
    },
    /// Fully automatic TBATS.
    Tbats,
    /// Neural network autoregression. With `harmonics` set, Fourier inputs
    /// replace the seasonal lags.
    Nnar {
        p: usize,
        #[serde(default)]
        seasonal_lags: usize,
        #[serde(default)]
        harmonics: Option<Vec<usize>>,
        #[serde(default = "default_repeats")]
        repeats: usize,
        #[serde(default = "default_seed")]
        seed: u64,
    },
    SeasonalNaive {
        period: usize,
    },
    /// Explicit-order seasonal ARIMA. `cached` routes the fit through the
    /// model cache when one is supplied.
    Sarima {
        order: ModelOrder,
        #[serde(default)]
        drift: bool,
        #[serde(default)]
        cached: bool,
    },
}

fn default_true() -> bool {
    true
}

fn default_repeats() -> usize {
    20
}

fn default_seed() -> u64 {
    42
}

fn harmonics_label(k: &[usize]) -> String {
    let parts: Vec<String> = k.iter().map(|v| v.to_string()).collect();
    format!("K=({})", parts.join(","))
}

impl ModelConfig {
    /// Every model of the evaluation, in reporting order.
    pub fn default_bank() -> Vec<ModelConfig> {
        let mut bank = vec![ModelConfig::StlEts];
        for k in [2, 4, 6, 12] {
            bank.push(ModelConfig::FourierArima {
                harmonics: vec![2, k],
                log: true,
            });
        }
        bank.push(ModelConfig::Tbats);
        bank.push(ModelConfig::Nnar {
            p: 14,
            seasonal_lags: 1,
            harmonics: None,
            repeats: default_repeats(),
            seed: default_seed(),
        });
        bank.push(ModelConfig::Nnar {
            p: 14,
            seasonal_lags: 0,
            harmonics: Some(vec![2, 4]),
            repeats: default_repeats(),
            seed: default_seed(),
        });
        bank.push(ModelConfig::SeasonalNaive { period: 7 });
        bank.push(ModelConfig::SeasonalNaive { period: 365 });
        bank.push(ModelConfig::Sarima {
            order: ModelOrder::seasonal(2, 0, 1, 1, 1, 1, 7),
            drift: true,
            cached: true,
        });
        bank
    }

    /// Short family name, also the cache kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelConfig::StlEts => "stl_ets",
            ModelConfig::FourierArima { .. } => "fourier_arima",
            ModelConfig::Tbats => "tbats",
            ModelConfig::Nnar { .. } => "nnar",
            ModelConfig::SeasonalNaive { .. } => "seasonal_naive",
            ModelConfig::Sarima { .. } => "sarima",
        }
    }

    /// Human-readable label, unique within [`default_bank`](Self::default_bank).
    pub fn label(&self) -> String {
        match self {
            ModelConfig::StlEts => "STL+ETS".to_string(),
            ModelConfig::FourierArima { harmonics, log } => {
                let base = format!("ARIMA+Fourier {}", harmonics_label(harmonics));
                if *log {
                    base
                } else {
                    format!("{base} untransformed")
                }
            }
            ModelConfig::Tbats => "TBATS".to_string(),
            ModelConfig::Nnar {
                p,
                seasonal_lags,
                harmonics,
                ..
            } => match harmonics {
                Some(k) => format!("NNAR({p}) {}", harmonics_label(k)),
                None => format!("NNAR({p},{seasonal_lags})"),
            },
            ModelConfig::SeasonalNaive { period } => format!("Seasonal naive ({period})"),
            ModelConfig::Sarima { order, drift, .. } => {
                if *drift {
                    format!("SARIMA{} with drift", order_label(order))
                } else {
                    format!("SARIMA{}", order_label(order))
                }
            }
        }
    }

    /// Unfitted model for this configuration.
    pub fn build(&self) -> BoxedForecaster {
        match self {
            ModelConfig::StlEts => Box::new(StlEts::new()),
            ModelConfig::FourierArima { harmonics, log } => {
                let model = FourierArima::new(harmonics.clone());
                if *log {
                    Box::new(model)
                } else {
                    Box::new(model.without_transform())
                }
            }
            ModelConfig::Tbats => Box::new(AutoTBATS::new()),
            ModelConfig::Nnar {
                p,
                seasonal_lags,
                harmonics,
                repeats,
                seed,
            } => {
                let model = match harmonics {
                    Some(k) => NNAR::with_fourier(*p, k.clone()),
                    None => NNAR::new(*p, *seasonal_lags),
                };
                Box::new(model.with_repeats(*repeats).with_seed(*seed))
            }
            ModelConfig::SeasonalNaive { period } => Box::new(SeasonalNaive::new(*period)),
            ModelConfig::Sarima { order, drift, .. } => Box::new(sarima(order, *drift)),
        }
    }
}

/// `(p,d,q)(P,D,Q)[s]` without the model name.
fn order_label(order: &ModelOrder) -> String {
    let full = order.to_string();
    full.trim_start_matches("ARIMA").to_string()
}

fn sarima(order: &ModelOrder, drift: bool) -> SARIMA {
    let constant = if drift { Constant::Drift } else { Constant::None };
    SARIMA::new(*order, constant)
}

/// A model fitted on one training series.
pub struct FittedModel {
    label: String,
    config: ModelConfig,
    model: BoxedForecaster,
    elapsed_ms: u128,
}

impl std::fmt::Debug for FittedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FittedModel")
            .field("label", &self.label)
            .field("config", &self.config)
            .field("elapsed_ms", &self.elapsed_ms)
            .finish()
    }
}

impl FittedModel {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn model(&self) -> &dyn Forecaster {
        self.model.as_ref()
    }

    /// Wall-clock time spent fitting (or loading from cache).
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed_ms
    }

    /// Point forecasts for the `horizon` days after the training data.
    pub fn forecast(&self, horizon: usize) -> Result<Forecast, ForecastError> {
        self.model.predict(horizon)
    }

    pub fn forecast_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast, ForecastError> {
        self.model.predict_with_intervals(horizon, level)
    }
}

/// Fit one configuration on `series`.
///
/// A cached SARIMA is loaded from `cache` when an entry for this exact
/// configuration and training data exists, and stored there otherwise.
/// Entries are grouped by configuration and data span (start date and
/// length), so a changed value replaces the entry for the same span.
pub fn fit(config: &ModelConfig, series: &TimeSeries, cache: Option<&ModelCache>) -> Result<FittedModel, FitError> {
    let started = Instant::now();
    let label = config.label();
    let model: BoxedForecaster = match (config, cache) {
        (ModelConfig::Sarima { order, drift, cached: true }, Some(cache)) => {
            // the span keeps training-window and full-series fits apart
            let span = (config, series.start_date(), series.len());
            let key = CacheKey::new(config.kind(), &span, series.fingerprint())?;
            let model = cache.get_or_fit(&key, || -> Result<SARIMA, FitError> {
                let mut model = sarima(order, *drift);
                model.fit(series)?;
                Ok(model)
            })?;
            Box::new(model)
        }
        _ => {
            let mut model = config.build();
            model.fit(series)?;
            model
        }
    };
    let elapsed_ms = started.elapsed().as_millis();
    info!(model = %label, elapsed_ms, n = series.len(), "model fitted");
    Ok(FittedModel {
        label,
        config: config.clone(),
        model,
        elapsed_ms,
    })
}

/// Outcome of fitting a list of configurations.
#[derive(Debug, Default)]
pub struct BankRun {
    pub fitted: Vec<FittedModel>,
    /// `(label, error message)` of every model that failed to fit.
    pub failures: Vec<(String, String)>,
}

impl BankRun {
    pub fn get(&self, label: &str) -> Option<&FittedModel> {
        self.fitted.iter().find(|m| m.label() == label)
    }
}

/// Fit every configuration in order. A failure is logged and recorded; the
/// remaining models are still fitted.
pub fn fit_all(configs: &[ModelConfig], series: &TimeSeries, cache: Option<&ModelCache>) -> BankRun {
    let mut run = BankRun::default();
    for config in configs {
        match fit(config, series, cache) {
            Ok(model) => run.fitted.push(model),
            Err(err) => {
                let label = config.label();
                warn!(model = %label, error = %err, "model failed to fit");
                run.failures.push((label, err.to_string()));
            }
        }
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn series(n: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2009, 1, 1).unwrap();
        let values = (0..n)
            .map(|i| 300.0 + 25.0 * ((i % 7) as f64 - 3.0).abs() + ((i * 13) % 5) as f64)
            .collect();
        TimeSeries::daily(start, values).unwrap()
    }

    #[test]
    fn default_bank_labels_are_unique() {
        let bank = ModelConfig::default_bank();
        assert_eq!(bank.len(), 11);
        let labels: HashSet<String> = bank.iter().map(|c| c.label()).collect();
        assert_eq!(labels.len(), bank.len());
        assert!(labels.contains("ARIMA+Fourier K=(2,12)"));
        assert!(labels.contains("NNAR(14,1)"));
        assert!(labels.contains("NNAR(14) K=(2,4)"));
        assert!(labels.contains("SARIMA(2,0,1)(1,1,1)[7] with drift"));
    }

    #[test]
    fn config_survives_serde() {
        for config in ModelConfig::default_bank() {
            let bytes = bincode::serialize(&config).unwrap();
            assert!(!bytes.is_empty());
        }
        let config = ModelConfig::Nnar {
            p: 3,
            seasonal_lags: 1,
            harmonics: None,
            repeats: 2,
            seed: 9,
        };
        assert_eq!(config.kind(), "nnar");
        assert_eq!(config.label(), "NNAR(3,1)");
    }

    #[test]
    fn fit_all_keeps_going_after_a_failure() {
        let configs = vec![
            ModelConfig::SeasonalNaive { period: 7 },
            ModelConfig::SeasonalNaive { period: 365 },
            ModelConfig::SeasonalNaive { period: 14 },
        ];
        let run = fit_all(&configs, &series(100), None);
        assert_eq!(run.fitted.len(), 2);
        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.failures[0].0, "Seasonal naive (365)");
        let f = run.get("Seasonal naive (14)").unwrap().forecast(10).unwrap();
        assert_eq!(f.horizon(), 10);
    }

    #[test]
    fn cached_sarima_is_reused() {
        let dir = tempdir().unwrap();
        let cache = ModelCache::open(dir.path()).unwrap();
        let config = ModelConfig::Sarima {
            order: ModelOrder::seasonal(1, 0, 0, 0, 1, 1, 7),
            drift: false,
            cached: true,
        };
        let data = series(140);
        let first = fit(&config, &data, Some(&cache)).unwrap();
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
        let second = fit(&config, &data, Some(&cache)).unwrap();
        assert_eq!(
            first.forecast(14).unwrap().point(),
            second.forecast(14).unwrap().point()
        );
    }

    #[test]
    fn uncached_sarima_leaves_the_cache_alone() {
        let dir = tempdir().unwrap();
        let cache = ModelCache::open(dir.path()).unwrap();
        let config = ModelConfig::Sarima {
            order: ModelOrder::seasonal(1, 0, 0, 0, 1, 1, 7),
            drift: false,
            cached: false,
        };
        fit(&config, &series(140), Some(&cache)).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
