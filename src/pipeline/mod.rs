//! The batch workflow: load, tag, split, fit, evaluate, refit, submit.
//!
//! Every stage is a plain function over explicit inputs; [`run`] chains
//! them under one [`PipelineConfig`].

pub mod evaluate;
pub mod split;
pub mod submission;

pub use evaluate::{accuracy, rank, write_report, AccuracyRecord, Leaderboard, LeaderboardRow};
pub use split::split;
pub use submission::{read_template, write_submission, Submission, SubmissionError, SubmissionTemplate};

use crate::cache::ModelCache;
use crate::config::PipelineConfig;
use crate::core::{TimeSeries, TimeSeriesBuilder};
use crate::data::load_inputs;
use crate::error::Result;
use crate::models::{fit, fit_all, ModelConfig};
use crate::seasonality::MSTL;
use crate::utils::stats;
use anyhow::Context;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Tag daily observations as a seasonal series starting at `anchor`.
pub fn build_series(
    observations: &[(NaiveDate, f64)],
    anchor: NaiveDate,
    periods: Vec<f64>,
) -> Result<TimeSeries> {
    let series = TimeSeriesBuilder::new()
        .observations(observations)
        .seasonal_periods(periods)
        .anchor(anchor)
        .build()?;
    info!(
        n = series.len(),
        start = %series.start_date(),
        end = %series.end_date(),
        periods = ?series.seasonal_periods(),
        "series built"
    );
    Ok(series)
}

/// Strength of each seasonal component and of the trend, in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub periods: Vec<usize>,
    pub seasonal_strength: Vec<f64>,
    /// Autocorrelation of the raw series at each period's lag.
    pub autocorrelation: Vec<f64>,
    pub trend_strength: f64,
}

/// MSTL decomposition over the series' periods, for the log only.
///
/// Periods that do not fit twice into the series are skipped. `None` when
/// none fit.
pub fn diagnose(series: &TimeSeries) -> Option<Diagnostics> {
    let mstl = MSTL::new(series.integer_periods()).fitting(series.len());
    let Some(result) = mstl.decompose(series.values()) else {
        debug!(n = series.len(), "series too short for decomposition");
        return None;
    };
    let seasonal_strength: Vec<f64> = (0..result.seasonal_periods.len())
        .filter_map(|i| result.seasonal_strength(i))
        .collect();
    let autocorrelation: Vec<f64> = result
        .seasonal_periods
        .iter()
        .map(|&p| stats::autocorrelation(series.values(), p))
        .collect();
    for ((period, strength), acf) in result
        .seasonal_periods
        .iter()
        .zip(&seasonal_strength)
        .zip(&autocorrelation)
    {
        info!(period, strength, acf, "seasonal strength");
    }
    let trend_strength = result.trend_strength();
    info!(strength = trend_strength, "trend strength");
    Some(Diagnostics {
        periods: result.seasonal_periods.clone(),
        seasonal_strength,
        autocorrelation,
        trend_strength,
    })
}

/// What a run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub leaderboard: Leaderboard,
    pub report: PathBuf,
    pub submissions: Vec<PathBuf>,
    /// `(model, error)` for every model that failed at any stage.
    pub failures: Vec<(String, String)>,
}

/// Run the whole workflow. Missing inputs, a bad template or a template
/// whose row count differs from the horizon fail the run; a single model
/// failing does not.
pub fn run(config: &PipelineConfig) -> anyhow::Result<RunSummary> {
    let inputs = load_inputs(&config.inputs).context("loading input tables")?;
    let joined = inputs.joined();
    info!(days = joined.len(), "load joined with weather");

    let series = build_series(&inputs.load_series(), config.anchor, config.seasonal_periods.clone())
        .context("building the daily series")?;
    diagnose(&series);

    let (train, test) = split(&series, config.test_horizon).context("splitting off the test year")?;
    let cache = ModelCache::open(&config.cache_dir)
        .with_context(|| format!("opening cache at {}", config.cache_dir.display()))?;

    let bank = fit_all(&config.models.evaluation, &train, Some(&cache));
    let mut failures = bank.failures;
    let mut records = Vec::new();
    for model in &bank.fitted {
        let scored = model
            .forecast(test.len())
            .and_then(|f| accuracy(test.values(), f.point(), train.values()));
        match scored {
            Ok(record) => {
                info!(model = %model.label(), horizon = test.len(), rmse = record.rmse, "model evaluated");
                records.push((model.label().to_string(), record));
            }
            Err(err) => {
                warn!(model = %model.label(), error = %err, "forecast failed");
                failures.push((model.label().to_string(), err.to_string()));
            }
        }
    }

    let leaderboard = rank(records);
    info!("hold-out accuracy\n{}", leaderboard.render());
    if let Some(best) = leaderboard.best_by_rmse() {
        info!(model = %best.model, rmse = best.metrics.rmse, "best by RMSE");
    }
    for row in leaderboard.disagreements() {
        warn!(
            model = %row.model,
            rmse_rank = row.rmse_rank,
            mape_rank = ?row.mape_rank,
            "RMSE and MAPE rank this model differently"
        );
    }
    for group in leaderboard.ties() {
        warn!(models = ?group, "RMSE does not separate these models");
    }

    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;
    let report = config.output_dir.join("accuracy.csv");
    write_report(&report, &leaderboard).with_context(|| format!("writing {}", report.display()))?;

    let template = read_template(&config.template).context("reading the submission template")?;
    if template.rows() != config.submission_horizon {
        let err = SubmissionError::RowCount {
            expected: template.rows(),
            got: config.submission_horizon,
        };
        return Err(anyhow::Error::new(err).context("checking the submission template"));
    }
    template.check_dates(&series.future_dates(config.submission_horizon));

    let mut submissions = Vec::new();
    for label in &config.models.submission {
        let Some(model_config) = find_config(&config.models.evaluation, label) else {
            warn!(model = %label, "submission model is not in the evaluation bank, skipped");
            failures.push((label.clone(), "unknown model".to_string()));
            continue;
        };
        let refit = fit(model_config, &series, Some(&cache))
            .map_err(anyhow::Error::from)
            .and_then(|model| Ok(Submission::from_model(&model, config.submission_horizon)?));
        match refit {
            Ok(submission) => {
                let path = write_submission(&config.output_dir, &template, &submission, &config.value_column)
                    .with_context(|| format!("writing the submission of {label}"))?;
                submissions.push(path);
            }
            Err(err) => {
                warn!(model = %label, error = %err, "refit on the full series failed");
                failures.push((label.clone(), err.to_string()));
            }
        }
    }

    info!(
        evaluated = leaderboard.len(),
        submissions = submissions.len(),
        failures = failures.len(),
        "run finished"
    );
    Ok(RunSummary {
        leaderboard,
        report,
        submissions,
        failures,
    })
}

fn find_config<'a>(configs: &'a [ModelConfig], label: &str) -> Option<&'a ModelConfig> {
    configs.iter().find(|c| c.label() == label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastError;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn observations(start: NaiveDate, n: usize) -> Vec<(NaiveDate, f64)> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                let weekly = (2.0 * std::f64::consts::PI * t / 7.0).sin();
                (start + chrono::Duration::days(i as i64), 100.0 + 0.05 * t + 10.0 * weekly)
            })
            .collect()
    }

    #[test]
    fn series_starts_at_the_anchor() {
        let obs = observations(day(2005, 12, 30), 40);
        let series = build_series(&obs, day(2006, 1, 1), vec![7.0, 365.25]).unwrap();
        assert_eq!(series.len(), 38);
        assert_eq!(series.start_date(), day(2006, 1, 1));
        assert_eq!(series.seasonal_periods(), &[7.0, 365.25]);
    }

    #[test]
    fn unobserved_anchor_is_rejected() {
        let obs = observations(day(2006, 1, 1), 10);
        assert!(matches!(
            build_series(&obs, day(2007, 1, 1), vec![7.0]),
            Err(ForecastError::TimestampError(_))
        ));
    }

    #[test]
    fn diagnose_skips_periods_that_do_not_fit() {
        let obs = observations(day(2006, 1, 1), 120);
        let series = build_series(&obs, day(2006, 1, 1), vec![7.0, 365.25]).unwrap();
        let diag = diagnose(&series).unwrap();
        assert_eq!(diag.periods, vec![7]);
        assert_eq!(diag.seasonal_strength.len(), 1);
        assert!(diag.autocorrelation[0] > 0.5);
        assert!(diag.seasonal_strength[0] > 0.5);
        assert!((0.0..=1.0).contains(&diag.trend_strength));
    }

    #[test]
    fn diagnose_needs_two_cycles() {
        let obs = observations(day(2006, 1, 1), 10);
        let series = build_series(&obs, day(2006, 1, 1), vec![7.0]).unwrap();
        assert!(diagnose(&series).is_none());
    }

    #[test]
    fn submission_labels_resolve_to_configs() {
        let bank = ModelConfig::default_bank();
        for label in crate::config::ModelSelection::default().submission {
            assert!(find_config(&bank, &label).is_some(), "{label}");
        }
        assert!(find_config(&bank, "Prophet").is_none());
    }
}
