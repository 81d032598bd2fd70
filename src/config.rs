//! Run configuration.
//!
//! The defaults are the fixed literals of the January 2011 workflow. A
//! `load-forecast.toml` in the working directory and `LOAD_FORECAST_`
//! environment variables (nested keys split on `__`) override them.

use crate::core::DAILY_SEASONALITY;
use crate::data::InputPaths;
use crate::models::ModelConfig;
use chrono::NaiveDate;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "load-forecast.toml";
pub const ENV_PREFIX: &str = "LOAD_FORECAST_";

/// Which models are evaluated and which get a submission file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub evaluation: Vec<ModelConfig>,
    /// Labels (see [`ModelConfig::label`]) refitted on the full series.
    pub submission: Vec<String>,
}

impl Default for ModelSelection {
    fn default() -> Self {
        let evaluation = ModelConfig::default_bank();
        let submission = evaluation
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    ModelConfig::FourierArima { .. } | ModelConfig::Tbats | ModelConfig::Sarima { .. }
                )
            })
            .map(|c| c.label())
            .collect();
        Self {
            evaluation,
            submission,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub inputs: InputPaths,
    /// Submission template: one row per target date.
    pub template: PathBuf,
    /// First day of the modelled series.
    pub anchor: NaiveDate,
    pub seasonal_periods: Vec<f64>,
    /// Held-out days for evaluation.
    pub test_horizon: usize,
    /// Days forecast for the submission.
    pub submission_horizon: usize,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Header of the forecast column in submission files.
    pub value_column: String,
    pub models: ModelSelection,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inputs: InputPaths {
                load: PathBuf::from("data/load.csv"),
                humidity: PathBuf::from("data/humidity.csv"),
                temperature: PathBuf::from("data/temperature.csv"),
                date_column: "date".to_string(),
            },
            template: PathBuf::from("data/submission_template.csv"),
            anchor: NaiveDate::from_ymd_opt(2006, 1, 1).unwrap_or_default(),
            seasonal_periods: DAILY_SEASONALITY.to_vec(),
            test_horizon: 365,
            submission_horizon: 31,
            output_dir: PathBuf::from("output"),
            cache_dir: PathBuf::from("output/cache"),
            value_column: "load".to_string(),
            models: ModelSelection::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults, then `load-forecast.toml`, then the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(PipelineConfig::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
