//! Submission files: one forecast per template row, in template order.

use crate::cache::slug;
use crate::core::Forecast;
use crate::data::parse_date;
use crate::error::ForecastError;
use crate::models::FittedModel;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("submission I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("template has {expected} rows but the forecast has {got} values")]
    RowCount { expected: usize, got: usize },

    #[error("template {path} has no columns")]
    EmptyTemplate { path: PathBuf },

    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

/// The fixed layout submissions must follow.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionTemplate {
    key_column: String,
    keys: Vec<String>,
}

impl SubmissionTemplate {
    pub fn new(key_column: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            key_column: key_column.into(),
            keys,
        }
    }

    /// Header of the first template column.
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// First-column values, in row order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn rows(&self) -> usize {
        self.keys.len()
    }

    /// The keys as dates, when every one of them parses.
    pub fn dates(&self) -> Option<Vec<NaiveDate>> {
        self.keys.iter().map(|k| parse_date(k)).collect()
    }

    /// Warn when the template's dates are not `expected`. Returns whether
    /// they matched; a template without dates counts as a match.
    pub fn check_dates(&self, expected: &[NaiveDate]) -> bool {
        match self.dates() {
            Some(dates) if dates != expected => {
                warn!(
                    template_first = ?dates.first(),
                    expected_first = ?expected.first(),
                    "template dates differ from the forecast dates"
                );
                false
            }
            _ => true,
        }
    }
}

pub fn read_template(path: &Path) -> Result<SubmissionTemplate, SubmissionError> {
    let csv_err = |source: csv::Error| SubmissionError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;
    let key_column = reader
        .headers()
        .map_err(csv_err)?
        .get(0)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SubmissionError::EmptyTemplate {
            path: path.to_path_buf(),
        })?;
    let mut keys = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        keys.push(record.get(0).unwrap_or_default().to_string());
    }
    Ok(SubmissionTemplate { key_column, keys })
}

/// A forecast bound to the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub label: String,
    pub forecast: Forecast,
}

impl Submission {
    pub fn new(label: impl Into<String>, forecast: Forecast) -> Self {
        Self {
            label: label.into(),
            forecast,
        }
    }

    /// Forecast `horizon` days from a model fitted on the full series.
    pub fn from_model(model: &FittedModel, horizon: usize) -> Result<Self, SubmissionError> {
        Ok(Self::new(model.label(), model.forecast(horizon)?))
    }

    /// `submission_<slug>.csv`
    pub fn file_name(&self) -> String {
        format!("submission_{}.csv", slug(&self.label))
    }
}

/// Write `submission` into `dir` following `template`'s row order. The
/// first template column is copied and the forecast goes into
/// `value_column`.
pub fn write_submission(
    dir: &Path,
    template: &SubmissionTemplate,
    submission: &Submission,
    value_column: &str,
) -> Result<PathBuf, SubmissionError> {
    let values = submission.forecast.point();
    if values.len() != template.rows() {
        return Err(SubmissionError::RowCount {
            expected: template.rows(),
            got: values.len(),
        });
    }
    fs::create_dir_all(dir).map_err(|source| SubmissionError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(submission.file_name());
    let csv_err = |source: csv::Error| SubmissionError::Csv {
        path: path.clone(),
        source,
    };
    let mut writer = csv::Writer::from_path(&path).map_err(csv_err)?;
    writer
        .write_record([template.key_column(), value_column])
        .map_err(csv_err)?;
    for (key, value) in template.keys().iter().zip(values) {
        writer
            .write_record([key.as_str(), value.to_string().as_str()])
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|source| SubmissionError::Io {
        path: path.clone(),
        source,
    })?;
    info!(model = %submission.label, path = %path.display(), horizon = values.len(), "submission written");
    Ok(path)
}
