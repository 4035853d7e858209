//! The periodic publish loop.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use sensorsim_common::encode;

use crate::channel::PublishChannel;
use crate::config::PublisherConfig;
use crate::error::PublishError;
use crate::generator::{ReadingGenerator, SimulatedTemperature};

/// Lifecycle of a publisher loop. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Running,
    Stopped,
}

/// Outcome counters for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of successfully published readings.
    pub success: usize,
    /// Number of failed publishes.
    pub failed: usize,
}

impl PublishStats {
    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }
}

/// Generates and publishes one reading per feed interval until shut down.
///
/// Each tick waits the full interval after the previous publish resolved
/// (fixed delay), so there is never more than one publish in flight.
/// Publish failures are logged and the loop carries on; only the shutdown
/// signal stops it.
pub struct PublisherLoop<C, G> {
    config: PublisherConfig,
    channel: C,
    generator: G,
    stats: PublishStats,
    state: LoopState,
}

impl<C: PublishChannel, G: ReadingGenerator> PublisherLoop<C, G> {
    pub fn new(config: PublisherConfig, channel: C, generator: G) -> Self {
        Self {
            config,
            channel,
            generator,
            stats: PublishStats::default(),
            state: LoopState::Running,
        }
    }

    /// Run until `shutdown` turns `true` or its sender is dropped.
    ///
    /// The channel is closed before returning.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PublishStats {
        let interval = self.config.feed_interval();

        info!(
            interval_ms = self.config.feed_interval_ms(),
            pubsub = %self.config.pubsub_name(),
            topic = %self.config.topic(),
            format = %self.config.format(),
            "Publisher loop started"
        );

        while self.state == LoopState::Running {
            if *shutdown.borrow_and_update() {
                self.state = LoopState::Stopped;
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    // A dropped sender can never signal again; treat it as a stop.
                    if changed.is_err() || *shutdown.borrow() {
                        self.state = LoopState::Stopped;
                    }
                    continue;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            self.tick().await;
        }

        self.channel.close().await;

        info!(
            published = self.stats.success,
            failed = self.stats.failed,
            "Publisher loop stopped"
        );

        self.stats
    }

    /// Generate one reading and attempt to publish it.
    async fn tick(&mut self) {
        let reading = self.generator.generate();

        let result = match encode(&reading, self.config.format()) {
            Ok(payload) => {
                self.channel
                    .publish(self.config.pubsub_name(), self.config.topic(), payload)
                    .await
            }
            Err(e) => Err(PublishError::from(e)),
        };

        match result {
            Ok(()) => {
                self.stats.success += 1;
                debug!(
                    pubsub = %self.config.pubsub_name(),
                    topic = %self.config.topic(),
                    sequence = reading.sequence,
                    temperature = reading.temperature,
                    "Published reading"
                );
            }
            Err(e) => {
                self.stats.failed += 1;
                warn!(
                    pubsub = %self.config.pubsub_name(),
                    topic = %self.config.topic(),
                    sequence = reading.sequence,
                    error = %e,
                    "Failed to publish reading"
                );
            }
        }
    }
}

/// Run a publisher loop with the default simulated temperature generator.
pub async fn run<C: PublishChannel>(
    config: PublisherConfig,
    channel: C,
    shutdown: watch::Receiver<bool>,
) -> PublishStats {
    PublisherLoop::new(config, channel, SimulatedTemperature::default())
        .run(shutdown)
        .await
}
