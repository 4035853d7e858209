//! Simulator lifecycle: resolve configuration, open backends, run the loop
//! until shutdown.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::channel::BackendRegistry;
use crate::config::{Overrides, PublisherConfig, SimulatorConfig};
use crate::error::Result;
use crate::generator::SimulatedTemperature;
use crate::publisher::{PublishStats, PublisherLoop};
use crate::shutdown;

/// Extra time allowed for an in-flight publish once shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A fully resolved simulator, ready to run.
///
/// Construction performs every fallible startup step, so a misconfigured
/// simulator never starts ticking.
pub struct SimulatorRunner {
    config: PublisherConfig,
    publisher: PublisherLoop<BackendRegistry, SimulatedTemperature>,
}

impl SimulatorRunner {
    /// Resolve configuration, build the generator and open the backends.
    pub async fn new(file: &SimulatorConfig, overrides: &Overrides) -> Result<Self> {
        let config = file.resolve(overrides)?;
        let generator = SimulatedTemperature::new(&file.generator)?;
        let backends = BackendRegistry::open(&file.backends_for(config.pubsub_name())?).await?;

        info!(
            backends = ?backends.names().collect::<Vec<_>>(),
            sensor = %file.generator.sensor_id,
            "Simulator ready"
        );

        Ok(Self {
            publisher: PublisherLoop::new(config.clone(), backends, generator),
            config,
        })
    }

    /// Get the resolved publish loop configuration.
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Run until `shutdown` fires.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> PublishStats {
        self.publisher.run(shutdown).await
    }

    /// Run until Ctrl+C or SIGTERM.
    ///
    /// Waits at most one feed interval plus a grace period for the loop to
    /// wind down after the signal.
    pub async fn run_until_signal(self) -> PublishStats {
        let (tx, rx) = shutdown::channel();
        let deadline = self.config.feed_interval() + SHUTDOWN_GRACE;

        let mut task = tokio::spawn(self.run(rx));

        tokio::select! {
            joined = &mut task => {
                // Only reachable if the loop task died without a shutdown request.
                return match joined {
                    Ok(stats) => stats,
                    Err(e) => {
                        warn!(error = %e, "Publisher loop task failed");
                        PublishStats::default()
                    }
                };
            }
            _ = shutdown::wait_for_signal() => {}
        }

        let _ = tx.send(true);

        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => {
                warn!(error = %e, "Publisher loop task failed");
                PublishStats::default()
            }
            Err(_) => {
                warn!(
                    timeout_ms = deadline.as_millis() as u64,
                    "Publisher loop did not stop in time"
                );
                PublishStats::default()
            }
        }
    }
}
