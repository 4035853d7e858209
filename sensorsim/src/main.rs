//! Simulated temperature sensor.
//!
//! Publishes a reading every feed interval until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use tracing::info;

use sensorsim::{ConfigError, SimulatorArgs, SimulatorConfig, SimulatorRunner};

#[tokio::main]
async fn main() -> Result<()> {
    let args = SimulatorArgs::parse();
    let overrides = args.overrides();

    // Load configuration
    let file = match &args.config {
        Some(path) => SimulatorConfig::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => SimulatorConfig::default(),
    };

    // Initialize logging
    sensorsim_common::init_tracing(&file.logging_with(&overrides))
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting sensorsim");
    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    let runner = SimulatorRunner::new(&file, &overrides)
        .await
        .context("Simulator failed to start")?;

    info!(
        "Publishing every {}ms to '{}' via '{}'",
        runner.config().feed_interval_ms(),
        runner.config().topic(),
        runner.config().pubsub_name()
    );

    let stats = runner.run_until_signal().await;

    info!(
        published = stats.success,
        failed = stats.failed,
        success_rate = stats.success_rate(),
        "Final statistics"
    );
    info!("Goodbye!");

    Ok(())
}
