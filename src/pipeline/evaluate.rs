//! Hold-out accuracy and the model leaderboard.
//!
//! The leaderboard is ordered by RMSE. Where MAPE would order the models
//! differently, or RMSE cannot separate two models, that is reported and
//! left to the reader.

use crate::utils::{calculate_metrics, AccuracyMetrics};
use crate::error::Result;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::Write as _;
use std::path::Path;

/// Seasonal period of the naive benchmark that scales MASE.
pub const MASE_SEASON: usize = 7;

/// Relative RMSE difference under which two models count as tied.
pub const TIE_TOLERANCE: f64 = 1e-9;

pub type AccuracyRecord = AccuracyMetrics;

/// Accuracy of `forecast` against the held-out `actual` values, aligned by
/// position. MASE is scaled by the weekly naive error over `train`.
pub fn accuracy(actual: &[f64], forecast: &[f64], train: &[f64]) -> Result<AccuracyRecord> {
    calculate_metrics(actual, forecast, Some(train), MASE_SEASON)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub model: String,
    pub metrics: AccuracyRecord,
    /// 1-based position by RMSE.
    pub rmse_rank: usize,
    /// 1-based position by MAPE; `None` when MAPE is undefined.
    pub mape_rank: Option<usize>,
}

/// Models ordered by RMSE, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Leaderboard {
    rows: Vec<LeaderboardRow>,
}

/// Ascending with NaN last.
fn cmp_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn within_tolerance(a: f64, b: f64) -> bool {
    a.is_finite() && b.is_finite() && (a - b).abs() <= TIE_TOLERANCE * a.abs().max(b.abs())
}

/// Order `(model, record)` pairs by RMSE and rank them by RMSE and MAPE.
pub fn rank(records: Vec<(String, AccuracyRecord)>) -> Leaderboard {
    let mut rows: Vec<LeaderboardRow> = records
        .into_iter()
        .map(|(model, metrics)| LeaderboardRow {
            model,
            metrics,
            rmse_rank: 0,
            mape_rank: None,
        })
        .collect();
    // stable: equal RMSE keeps input order
    rows.sort_by(|a, b| cmp_nan_last(a.metrics.rmse, b.metrics.rmse));
    for (i, row) in rows.iter_mut().enumerate() {
        row.rmse_rank = i + 1;
    }

    let mut by_mape: Vec<(usize, f64)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.metrics.mape.filter(|m| !m.is_nan()).map(|m| (i, m)))
        .collect();
    by_mape.sort_by(|a, b| cmp_nan_last(a.1, b.1));
    for (position, (i, _)) in by_mape.into_iter().enumerate() {
        rows[i].mape_rank = Some(position + 1);
    }
    Leaderboard { rows }
}

impl Leaderboard {
    pub fn rows(&self) -> &[LeaderboardRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn best_by_rmse(&self) -> Option<&LeaderboardRow> {
        self.rows.first().filter(|r| !r.metrics.rmse.is_nan())
    }

    pub fn best_by_mape(&self) -> Option<&LeaderboardRow> {
        self.rows.iter().find(|r| r.mape_rank == Some(1))
    }

    /// Models whose MAPE rank differs from their RMSE rank.
    pub fn disagreements(&self) -> Vec<&LeaderboardRow> {
        self.rows
            .iter()
            .filter(|r| r.mape_rank.is_some_and(|m| m != r.rmse_rank))
            .collect()
    }

    /// Groups of two or more adjacent models with indistinguishable RMSE.
    pub fn ties(&self) -> Vec<Vec<&str>> {
        let mut groups = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut last = f64::NAN;
        for row in &self.rows {
            if !current.is_empty() && within_tolerance(last, row.metrics.rmse) {
                current.push(&row.model);
            } else {
                if current.len() > 1 {
                    groups.push(std::mem::take(&mut current));
                }
                current = vec![row.model.as_str()];
            }
            last = row.metrics.rmse;
        }
        if current.len() > 1 {
            groups.push(current);
        }
        groups
    }

    /// Plain-text table, one line per model.
    pub fn render(&self) -> String {
        let width = self
            .rows
            .iter()
            .map(|r| r.model.len())
            .max()
            .unwrap_or(0)
            .max("model".len());
        let opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"));

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>4}  {:<width$}  {:>12}  {:>12}  {:>8}  {:>8}  {:>6}  {:>9}",
            "rank", "model", "RMSE", "MAE", "MAPE", "sMAPE", "MASE", "MAPE rank"
        );
        for r in &self.rows {
            let _ = writeln!(
                out,
                "{:>4}  {:<width$}  {:>12.3}  {:>12.3}  {:>8}  {:>8.3}  {:>6}  {:>9}",
                r.rmse_rank,
                r.model,
                r.metrics.rmse,
                r.metrics.mae,
                opt(r.metrics.mape),
                r.metrics.smape,
                opt(r.metrics.mase),
                r.mape_rank.map_or_else(|| "-".to_string(), |m| m.to_string()),
            );
        }
        out
    }
}

#[derive(Serialize)]
struct ReportRow<'a> {
    model: &'a str,
    rmse_rank: usize,
    mape_rank: Option<usize>,
    me: f64,
    rmse: f64,
    mae: f64,
    mpe: Option<f64>,
    mape: Option<f64>,
    smape: f64,
    mase: Option<f64>,
}

/// Write the leaderboard as CSV, best model first.
pub fn write_report(path: &Path, board: &Leaderboard) -> csv::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for r in board.rows() {
        let m = &r.metrics;
        writer.serialize(ReportRow {
            model: &r.model,
            rmse_rank: r.rmse_rank,
            mape_rank: r.mape_rank,
            me: m.me,
            rmse: m.rmse,
            mae: m.mae,
            mpe: m.mpe,
            mape: m.mape,
            smape: m.smape,
            mase: m.mase,
        })?;
    }
    writer.flush()?;
    Ok(())
}
