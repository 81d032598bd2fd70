use anyhow::{Context, Result};
use load_forecast::config::PipelineConfig;
use load_forecast::{pipeline, telemetry};
use tracing::info;

fn main() -> Result<()> {
    telemetry::init_tracing();

    let config = PipelineConfig::load().context("reading configuration")?;
    info!(
        anchor = %config.anchor,
        test_horizon = config.test_horizon,
        horizon = config.submission_horizon,
        models = config.models.evaluation.len(),
        "starting run"
    );

    let summary = pipeline::run(&config)?;
    if let Some(best) = summary.leaderboard.best_by_rmse() {
        info!(model = %best.model, rmse = best.metrics.rmse, "selected by hold-out RMSE");
    }
    for path in &summary.submissions {
        info!(path = %path.display(), "submission");
    }
    Ok(())
}
