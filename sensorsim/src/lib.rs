//! Simulated sensor publisher.
//!
//! Synthesizes a temperature reading at a fixed interval and publishes it
//! to a topic through a named pub/sub backend, standing in for a physical
//! sensor while downstream consumers are developed.
//!
//! # Overview
//!
//! - [`PublisherConfig`] - validated loop parameters (interval, backend, topic)
//! - [`PublisherLoop`] - the fixed-delay generate/publish loop
//! - [`PublishChannel`] - the publish capability the loop depends on
//! - [`BackendRegistry`] - named Zenoh or log backends
//! - [`SimulatedTemperature`] - bounded random-walk reading generator
//! - [`SimulatorRunner`] - startup and signal-driven shutdown
//!
//! # Example
//!
//! ```ignore
//! use sensorsim::{Overrides, SimulatorConfig, SimulatorRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runner = SimulatorRunner::new(&SimulatorConfig::default(), &Overrides::default()).await?;
//!
//!     // Publish to "telemetry" via "messaging" every second until Ctrl+C
//!     runner.run_until_signal().await;
//!     Ok(())
//! }
//! ```

pub mod args;
pub mod channel;
pub mod config;
pub mod error;
pub mod generator;
pub mod publisher;
pub mod runner;
pub mod shutdown;

pub use args::SimulatorArgs;
pub use channel::{Backend, BackendRegistry, LogChannel, PublishChannel, ZenohChannel};
pub use config::{
    BackendConfig, GeneratorConfig, Overrides, PublisherConfig, SimulatorConfig,
};
pub use error::{ConfigError, Error, PublishError, Result};
pub use generator::{ReadingGenerator, SimulatedTemperature};
pub use publisher::{PublishStats, PublisherLoop, run};
pub use runner::SimulatorRunner;

// Re-export the reading model for consumers
pub use sensorsim_common::{Format, SensorReading};
