//! CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Overrides;

/// Simulated temperature sensor publishing readings to a pub/sub backend.
#[derive(Parser, Debug, Clone)]
#[command(name = "sensorsim")]
#[command(about = "Publishes simulated temperature readings at a fixed interval")]
#[command(version)]
pub struct SimulatorArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Milliseconds between readings (default: 1000).
    #[arg(short = 'i', long = "feed-interval", allow_negative_numbers = true)]
    pub feed_interval_ms: Option<i64>,

    /// Pub/sub backend to publish through (default: messaging).
    #[arg(short = 'm', long = "messaging-pubsub")]
    pub pubsub_name: Option<String>,

    /// Topic to publish readings to (default: telemetry).
    #[arg(short = 't', long = "messaging-pubsub-topic")]
    pub topic: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl SimulatorArgs {
    /// Parse CLI arguments.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Values that override the config file.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            feed_interval_ms: self.feed_interval_ms,
            pubsub_name: self.pubsub_name.clone(),
            topic: self.topic.clone(),
            log_level: self.log_level.clone(),
        }
    }
}
