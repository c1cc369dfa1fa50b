use anyhow::{Context, Result};
use meter_forecast::{config, forecast, telemetry};
use config::Config;
use forecast::ForecastPipeline;
use telemetry::init_tracing;
use tracing::info;

fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load().context("loading configuration")?;
    info!(csv = %cfg.input.csv_path.display(), target = %cfg.input.target_column, "starting forecast run");

    let outcome = ForecastPipeline::new(cfg)
        .run()
        .context("forecast pipeline failed")?;
    print!("{}", outcome.render_report());

    info!("run complete");
    Ok(())
}
