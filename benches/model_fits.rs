//! Benchmarks for the fits and transforms on the evaluation path.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use load_forecast::core::TimeSeries;
use load_forecast::models::{fit, ModelConfig, ModelOrder};
use load_forecast::seasonality::MSTL;
use load_forecast::transform::FourierTerms;

fn daily_load(n: usize) -> TimeSeries {
    let start = NaiveDate::from_ymd_opt(2006, 1, 1).unwrap();
    let values = (0..n)
        .map(|i| {
            let t = i as f64;
            1000.0
                + 80.0 * (2.0 * std::f64::consts::PI * t / 7.0).cos()
                + 200.0 * (2.0 * std::f64::consts::PI * t / 365.25).cos()
                + ((i * 31) % 17) as f64
        })
        .collect();
    TimeSeries::daily(start, values).unwrap()
}

fn bench_fits(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_fits");
    group.sample_size(10);

    for years in [2usize, 4] {
        let series = daily_load(365 * years);
        let configs = [
            ModelConfig::SeasonalNaive { period: 7 },
            ModelConfig::FourierArima {
                harmonics: vec![2, 4],
                log: true,
            },
            ModelConfig::Sarima {
                order: ModelOrder::seasonal(2, 0, 1, 1, 1, 1, 7),
                drift: true,
                cached: false,
            },
        ];
        for config in &configs {
            group.bench_with_input(BenchmarkId::new(config.label(), years), &series, |b, s| {
                b.iter(|| fit(black_box(config), s, None))
            });
        }
    }

    group.finish();
}

fn bench_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessing");
    let series = daily_load(365 * 5);

    group.bench_function("mstl_7_365", |b| {
        let mstl = MSTL::new(vec![7, 365]);
        b.iter(|| mstl.decompose(black_box(series.values())))
    });

    for k in [2usize, 12] {
        group.bench_with_input(BenchmarkId::new("fourier_terms", k), &k, |b, &k| {
            let terms = FourierTerms::new(&[7.0, 365.25], &[2, k]).unwrap();
            b.iter(|| terms.generate(0, black_box(series.len())).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fits, bench_preprocessing);
criterion_main!(benches);
