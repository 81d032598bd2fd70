//! CSV readers that reduce intra-day readings to one figure per day.
//!
//! Each file has a date column and any number of reading columns (hourly
//! load, or one reading per measurement time for weather stations). A row
//! is reduced to the mean of its numeric cells. Rows sharing a date (one
//! per station) are then averaged.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
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

    #[error("{path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}, line {line}: unparseable date '{value}'")]
    BadDate {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("{path} yields no daily values")]
    Empty { path: PathBuf },
}

/// One day of the joined exploratory frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub load: f64,
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
}

/// Locations of the three input tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPaths {
    pub load: PathBuf,
    pub humidity: PathBuf,
    pub temperature: PathBuf,
    pub date_column: String,
}

/// Daily series read from the three tables, each sorted by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyInputs {
    pub load: Vec<(NaiveDate, f64)>,
    pub humidity: Vec<(NaiveDate, f64)>,
    pub temperature: Vec<(NaiveDate, f64)>,
}

impl DailyInputs {
    /// Inner join on date: only days present in all three tables.
    pub fn joined(&self) -> Vec<DailyObservation> {
        let humidity: BTreeMap<NaiveDate, f64> = self.humidity.iter().copied().collect();
        let temperature: BTreeMap<NaiveDate, f64> = self.temperature.iter().copied().collect();
        self.load
            .iter()
            .filter_map(|&(date, load)| {
                let h = humidity.get(&date)?;
                let t = temperature.get(&date)?;
                Some(DailyObservation {
                    date,
                    load,
                    humidity: Some(*h),
                    temperature: Some(*t),
                })
            })
            .collect()
    }

    /// The modelled series: daily load on its own.
    pub fn load_series(&self) -> Vec<(NaiveDate, f64)> {
        self.load.clone()
    }
}

/// Accepted date layouts, tried in order.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M"];

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                .map(|dt| dt.date())
        })
}

/// Read one table and reduce it to a daily series sorted by date.
pub fn read_daily(path: &Path, date_column: &str) -> Result<Vec<(NaiveDate, f64)>, LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers().map_err(csv_err)?.clone();
    let date_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(date_column))
        .ok_or_else(|| LoadError::MissingColumn {
            path: path.to_path_buf(),
            column: date_column.to_string(),
        })?;

    // per date: sum of row means, number of rows
    let mut days: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    let mut rows = 0usize;
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map_or(0, |p| p.line());
        let raw_date = record.get(date_idx).unwrap_or_default();
        if raw_date.is_empty() {
            continue;
        }
        let date = parse_date(raw_date).ok_or_else(|| LoadError::BadDate {
            path: path.to_path_buf(),
            line,
            value: raw_date.to_string(),
        })?;

        let readings: Vec<f64> = record
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != date_idx)
            .filter_map(|(_, cell)| cell.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .collect();
        rows += 1;
        if readings.is_empty() {
            continue;
        }
        let row_mean = readings.iter().sum::<f64>() / readings.len() as f64;
        let entry = days.entry(date).or_insert((0.0, 0));
        entry.0 += row_mean;
        entry.1 += 1;
    }

    if days.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    debug!(path = %path.display(), rows, days = days.len(), "table reduced to daily values");
    Ok(days
        .into_iter()
        .map(|(date, (sum, count))| (date, sum / count as f64))
        .collect())
}

/// Read all three tables. Any missing or malformed file fails the load.
pub fn load_inputs(paths: &InputPaths) -> Result<DailyInputs, LoadError> {
    let inputs = DailyInputs {
        load: read_daily(&paths.load, &paths.date_column)?,
        humidity: read_daily(&paths.humidity, &paths.date_column)?,
        temperature: read_daily(&paths.temperature, &paths.date_column)?,
    };
    info!(
        load_days = inputs.load.len(),
        humidity_days = inputs.humidity.len(),
        temperature_days = inputs.temperature.len(),
        "inputs loaded"
    );
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::tempdir;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn hourly_columns_are_averaged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("load.csv");
        fs::write(
            &path,
            "date,h1,h2,h3\n2006-01-02,3,4,5\n2006-01-01,1,2,3\n",
        )
        .unwrap();
        let daily = read_daily(&path, "date").unwrap();
        assert_eq!(daily, vec![(day(2006, 1, 1), 2.0), (day(2006, 1, 2), 4.0)]);
    }

    #[test]
    fn stations_are_averaged_per_date() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("temperature.csv");
        fs::write(
            &path,
            "station,Date,t0,t12\nA,1/1/2006,10,20\nB,1/1/2006,30,40,\nA,1/2/2006,,8\n",
        )
        .unwrap();
        let daily = read_daily(&path, "date").unwrap();
        assert_eq!(daily.len(), 2);
        // station rows average to 15 and 35
        assert_relative_eq!(daily[0].1, 25.0);
        assert_relative_eq!(daily[1].1, 8.0);
    }

    #[test]
    fn bad_date_reports_its_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("load.csv");
        fs::write(&path, "date,h1\n2006-01-01,1\nyesterday,2\n").unwrap();
        match read_daily(&path, "date") {
            Err(LoadError::BadDate { line, value, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(value, "yesterday");
            }
            other => panic!("expected BadDate, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_and_empty_file_fail() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            read_daily(&dir.path().join("absent.csv"), "date"),
            Err(LoadError::Io { .. })
        ));
        let path = dir.path().join("empty.csv");
        fs::write(&path, "date,h1\n2006-01-01,\n").unwrap();
        assert!(matches!(read_daily(&path, "date"), Err(LoadError::Empty { .. })));
        assert!(matches!(
            read_daily(&path, "when"),
            Err(LoadError::MissingColumn { .. })
        ));
    }

    #[test]
    fn join_keeps_common_dates_only() {
        let inputs = DailyInputs {
            load: vec![(day(2006, 1, 1), 100.0), (day(2006, 1, 2), 110.0), (day(2006, 1, 3), 90.0)],
            humidity: vec![(day(2006, 1, 1), 0.5), (day(2006, 1, 3), 0.7)],
            temperature: vec![(day(2006, 1, 1), 5.0), (day(2006, 1, 2), 6.0), (day(2006, 1, 3), 7.0)],
        };
        let joined = inputs.joined();
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[1].date, day(2006, 1, 3));
        assert_eq!(joined[1].humidity, Some(0.7));
        assert_eq!(inputs.load_series().len(), 3);
    }

    #[test]
    fn date_formats() {
        assert_eq!(parse_date("2010-12-31"), Some(day(2010, 12, 31)));
        assert_eq!(parse_date("12/31/2010"), Some(day(2010, 12, 31)));
        assert_eq!(parse_date("2010/12/31"), Some(day(2010, 12, 31)));
        assert_eq!(parse_date("2010-12-31 00:00:00"), Some(day(2010, 12, 31)));
        assert_eq!(parse_date("31.12.2010"), None);
    }
}
