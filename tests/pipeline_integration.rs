//! End-to-end runs over CSV fixtures in temporary directories.

use chrono::{Duration, NaiveDate};
use load_forecast::config::{ModelSelection, PipelineConfig};
use load_forecast::data::InputPaths;
use load_forecast::models::{ModelConfig, ModelOrder};
use load_forecast::pipeline::{self, SubmissionError};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DAYS: usize = 500;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()
}

/// Whole-number daily load with a weekly cycle and a slow drift.
fn daily_load(i: usize) -> f64 {
    let weekday = [40.0, 55.0, 60.0, 58.0, 50.0, 10.0, 0.0][i % 7];
    (1000.0 + weekday + (i / 30) as f64 + ((i * 7) % 5) as f64).round()
}

/// Hourly readings whose mean is exactly `daily_load(i)`.
fn write_load(path: &Path, days: usize, bump: Option<usize>) {
    let mut text = String::from("date,h1,h2,h3\n");
    // one day before the anchor, dropped by the series builder
    text.push_str(&format!("{},1,1,1\n", start() - Duration::days(1)));
    for i in 0..days {
        let mut v = daily_load(i);
        if bump == Some(i) {
            v += 3.0;
        }
        let date = start() + Duration::days(i as i64);
        text.push_str(&format!("{date},{},{v},{}\n", v - 1.0, v + 1.0));
    }
    fs::write(path, text).unwrap();
}

fn write_weather(path: &Path, days: usize, base: f64) {
    let mut text = String::from("station,date,t0,t12\n");
    for i in 0..days {
        let date = start() + Duration::days(i as i64);
        for station in ["A", "B"] {
            text.push_str(&format!("{station},{date},{},{}\n", base, base + 2.0));
        }
    }
    fs::write(path, text).unwrap();
}

fn write_template(path: &Path, rows: usize) {
    let first = start() + Duration::days(DAYS as i64);
    let mut text = String::from("Date,Load\n");
    for i in 0..rows {
        text.push_str(&format!("{},\n", first + Duration::days(i as i64)));
    }
    fs::write(path, text).unwrap();
}

fn sarima() -> ModelConfig {
    ModelConfig::Sarima {
        order: ModelOrder::seasonal(1, 0, 0, 0, 1, 1, 7),
        drift: false,
        cached: true,
    }
}

struct Fixture {
    dir: TempDir,
    config: PipelineConfig,
}

fn fixture(template_rows: usize) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_load(&root.join("load.csv"), DAYS, None);
    write_weather(&root.join("humidity.csv"), DAYS, 70.0);
    write_weather(&root.join("temperature.csv"), DAYS, 12.0);
    write_template(&root.join("template.csv"), template_rows);

    let evaluation = vec![
        ModelConfig::SeasonalNaive { period: 7 },
        ModelConfig::SeasonalNaive { period: 365 },
        sarima(),
    ];
    let submission = vec![
        ModelConfig::SeasonalNaive { period: 7 }.label(),
        sarima().label(),
    ];
    let config = PipelineConfig {
        inputs: InputPaths {
            load: root.join("load.csv"),
            humidity: root.join("humidity.csv"),
            temperature: root.join("temperature.csv"),
            date_column: "date".to_string(),
        },
        template: root.join("template.csv"),
        anchor: start(),
        test_horizon: 60,
        output_dir: root.join("out"),
        cache_dir: root.join("out").join("cache"),
        models: ModelSelection {
            evaluation,
            submission,
        },
        ..PipelineConfig::default()
    };
    Fixture { dir, config }
}

fn cache_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|x| x == "bin"))
        .collect();
    entries.sort();
    entries
}

fn read_values(path: &Path) -> Vec<f64> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap()[1].parse::<f64>().unwrap())
        .collect()
}

#[test]
fn full_run_writes_report_and_submissions() {
    let fx = fixture(31);
    let summary = pipeline::run(&fx.config).unwrap();

    assert_eq!(summary.leaderboard.len(), 3);
    assert!(summary.failures.is_empty(), "{:?}", summary.failures);
    assert!(summary.report.exists());
    let report = fs::read_to_string(&summary.report).unwrap();
    assert_eq!(report.lines().count(), 4);

    assert_eq!(summary.submissions.len(), 2);
    for path in &summary.submissions {
        let values = read_values(path);
        assert_eq!(values.len(), 31);
        assert!(values.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn each_submission_holds_its_own_model() {
    let fx = fixture(31);
    pipeline::run(&fx.config).unwrap();
    let out = fx.dir.path().join("out");

    let naive = read_values(&out.join("submission_seasonal_naive_7.csv"));
    for (k, v) in naive.iter().enumerate() {
        let one_week_back = DAYS - 7 + k % 7;
        assert_eq!(*v, daily_load(one_week_back), "day {k}");
    }

    let sarima_file = out.join(format!("submission_{}.csv", load_forecast::cache::slug(&sarima().label())));
    let sarima_values = read_values(&sarima_file);
    assert_eq!(sarima_values.len(), 31);
    assert_ne!(sarima_values, naive);

    let template = fs::read_to_string(fx.dir.path().join("template.csv")).unwrap();
    let written = fs::read_to_string(&sarima_file).unwrap();
    let template_keys: Vec<&str> = template.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
    let written_keys: Vec<&str> = written.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
    assert_eq!(template_keys, written_keys);
}

#[test]
fn template_row_count_mismatch_fails_the_run() {
    let fx = fixture(30);
    let err = pipeline::run(&fx.config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SubmissionError>(),
        Some(SubmissionError::RowCount { expected: 30, got: 31 })
    ));
    assert!(!fx.dir.path().join("out").join("submission_seasonal_naive_7.csv").exists());
}

#[test]
fn missing_input_fails_the_run() {
    let mut fx = fixture(31);
    fx.config.inputs.humidity = fx.dir.path().join("absent.csv");
    assert!(pipeline::run(&fx.config).is_err());
}

#[test]
fn changed_data_invalidates_the_cached_model() {
    let fx = fixture(31);
    let cache_dir = fx.config.cache_dir.clone();
    pipeline::run(&fx.config).unwrap();
    // one entry for the training fit, one for the full-series refit
    let before = cache_entries(&cache_dir);
    assert_eq!(before.len(), 2);

    pipeline::run(&fx.config).unwrap();
    assert_eq!(cache_entries(&cache_dir), before);

    // a change inside the training window alters both fingerprints
    write_load(&fx.config.inputs.load, DAYS, Some(100));
    pipeline::run(&fx.config).unwrap();
    let after = cache_entries(&cache_dir);
    assert_eq!(after.len(), 2);
    assert!(after.iter().all(|p| !before.contains(p)));
}
