//! Configuration for the sensor simulator.
//!
//! Values are layered: built-in defaults, then the optional JSON5 file, then
//! command-line overrides. [`SimulatorConfig::resolve`] produces the
//! immutable [`PublisherConfig`] the loop runs with.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sensorsim_common::{Format, LoggingConfig, ZenohConfig, validate_topic};

use crate::error::ConfigError;

/// Default delay between ticks.
pub const DEFAULT_FEED_INTERVAL_MS: i64 = 1000;

/// Default pub/sub backend name.
pub const DEFAULT_PUBSUB_NAME: &str = "messaging";

/// Default topic.
pub const DEFAULT_TOPIC: &str = "telemetry";

/// Default sensor identifier carried in every reading.
pub const DEFAULT_SENSOR_ID: &str = "simulated-temperature-sensor";

/// Parameters of the publish loop, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    feed_interval: Duration,
    pubsub_name: String,
    topic: String,
    format: Format,
}

impl PublisherConfig {
    /// Create a validated configuration.
    ///
    /// Rejects a non-positive interval, an empty backend name and a topic
    /// that is not a concrete key expression.
    pub fn new(
        feed_interval_ms: i64,
        pubsub_name: impl Into<String>,
        topic: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let pubsub_name = pubsub_name.into();
        let topic = topic.into();

        if feed_interval_ms <= 0 {
            return Err(ConfigError::invalid(
                "feed interval",
                format!("must be a positive number of milliseconds, got {}", feed_interval_ms),
            ));
        }
        if pubsub_name.trim().is_empty() {
            return Err(ConfigError::invalid("pub/sub name", "must not be empty"));
        }
        validate_topic(&topic)?;

        Ok(Self {
            feed_interval: Duration::from_millis(feed_interval_ms as u64),
            pubsub_name,
            topic,
            format: Format::default(),
        })
    }

    /// Set the payload serialization format.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn feed_interval(&self) -> Duration {
        self.feed_interval
    }

    pub fn feed_interval_ms(&self) -> u64 {
        self.feed_interval.as_millis() as u64
    }

    pub fn pubsub_name(&self) -> &str {
        &self.pubsub_name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            feed_interval: Duration::from_millis(DEFAULT_FEED_INTERVAL_MS as u64),
            pubsub_name: DEFAULT_PUBSUB_NAME.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            format: Format::default(),
        }
    }
}

/// Complete simulator configuration as read from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Publish loop settings.
    #[serde(default)]
    pub publisher: PublisherSection,

    /// Reading generator settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Named pub/sub backends.
    #[serde(default)]
    pub backends: BTreeMap<String, BackendConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Publish loop section of the config file. Unset values fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublisherSection {
    /// Milliseconds between ticks (default: 1000).
    #[serde(default)]
    pub feed_interval_ms: Option<i64>,

    /// Backend to publish through (default: "messaging").
    #[serde(default)]
    pub pubsub_name: Option<String>,

    /// Destination topic (default: "telemetry").
    #[serde(default)]
    pub topic: Option<String>,

    /// Payload format: "json" or "cbor" (default: json).
    #[serde(default)]
    pub format: Format,
}

/// A pub/sub backend declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Publish through a Zenoh session.
    Zenoh {
        #[serde(default)]
        zenoh: ZenohConfig,

        /// Prepended to the topic to form the key expression (default: none).
        #[serde(default)]
        key_prefix: String,
    },

    /// Emit readings as log events instead of sending them anywhere.
    Log,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Zenoh {
            zenoh: ZenohConfig::default(),
            key_prefix: String::new(),
        }
    }
}

impl BackendConfig {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if name.trim().is_empty() {
            return Err(ConfigError::invalid("backend name", "must not be empty"));
        }
        if let BackendConfig::Zenoh { zenoh, key_prefix } = self {
            zenoh
                .validate()
                .map_err(|e| ConfigError::invalid("backend", format!("'{}': {}", name, e)))?;
            if !key_prefix.is_empty() {
                validate_topic(key_prefix).map_err(|e| {
                    ConfigError::invalid("backend key prefix", format!("'{}': {}", name, e))
                })?;
            }
        }
        Ok(())
    }
}

/// Simulated temperature settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Sensor identifier carried in each reading.
    #[serde(default = "default_sensor_id")]
    pub sensor_id: String,

    /// Starting temperature (default: 21.0).
    #[serde(default = "default_base")]
    pub base: f64,

    /// Lower bound (default: 15.0).
    #[serde(default = "default_min")]
    pub min: f64,

    /// Upper bound (default: 30.0).
    #[serde(default = "default_max")]
    pub max: f64,

    /// Largest change between two consecutive readings (default: 0.5).
    #[serde(default = "default_max_step")]
    pub max_step: f64,

    /// Seed for a reproducible sequence. Seeded from the OS when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_sensor_id() -> String {
    DEFAULT_SENSOR_ID.to_string()
}

fn default_base() -> f64 {
    21.0
}

fn default_min() -> f64 {
    15.0
}

fn default_max() -> f64 {
    30.0
}

fn default_max_step() -> f64 {
    0.5
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            sensor_id: default_sensor_id(),
            base: default_base(),
            min: default_min(),
            max: default_max(),
            max_step: default_max_step(),
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Validate bounds and identifier.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor_id.trim().is_empty() {
            return Err(ConfigError::invalid("sensor id", "must not be empty"));
        }
        if ![self.base, self.min, self.max, self.max_step]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ConfigError::invalid("generator", "values must be finite"));
        }
        if self.min > self.max {
            return Err(ConfigError::invalid(
                "generator",
                format!("min ({}) is greater than max ({})", self.min, self.max),
            ));
        }
        if self.base < self.min || self.base > self.max {
            return Err(ConfigError::invalid(
                "generator",
                format!(
                    "base ({}) is outside [{}, {}]",
                    self.base, self.min, self.max
                ),
            ));
        }
        if self.max_step < 0.0 {
            return Err(ConfigError::invalid(
                "generator",
                format!("max_step ({}) must not be negative", self.max_step),
            ));
        }
        Ok(())
    }
}

/// Values supplied on the command line. They win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub feed_interval_ms: Option<i64>,
    pub pubsub_name: Option<String>,
    pub topic: Option<String>,
    pub log_level: Option<String>,
}

impl SimulatorConfig {
    /// Load configuration from a JSON5 file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(content)?)
    }

    /// Resolve the publish loop parameters.
    ///
    /// Also validates the generator and backend sections and checks that
    /// the selected backend is declared, so that nothing invalid reaches
    /// the loop.
    pub fn resolve(&self, overrides: &Overrides) -> Result<PublisherConfig, ConfigError> {
        let feed_interval_ms = overrides
            .feed_interval_ms
            .or(self.publisher.feed_interval_ms)
            .unwrap_or(DEFAULT_FEED_INTERVAL_MS);
        let pubsub_name = overrides
            .pubsub_name
            .clone()
            .or_else(|| self.publisher.pubsub_name.clone())
            .unwrap_or_else(|| DEFAULT_PUBSUB_NAME.to_string());
        let topic = overrides
            .topic
            .clone()
            .or_else(|| self.publisher.topic.clone())
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string());

        let config = PublisherConfig::new(feed_interval_ms, pubsub_name, topic)?
            .with_format(self.publisher.format);

        self.generator.validate()?;
        self.backends_for(config.pubsub_name())?;

        Ok(config)
    }

    /// Backends to open for a run publishing through `pubsub_name`.
    ///
    /// With no backends declared, a Zenoh backend with default connection
    /// settings is registered under `pubsub_name`.
    pub fn backends_for(
        &self,
        pubsub_name: &str,
    ) -> Result<BTreeMap<String, BackendConfig>, ConfigError> {
        if self.backends.is_empty() {
            let mut backends = BTreeMap::new();
            backends.insert(pubsub_name.to_string(), BackendConfig::default());
            return Ok(backends);
        }

        for (name, backend) in &self.backends {
            backend.validate(name)?;
        }

        if !self.backends.contains_key(pubsub_name) {
            return Err(ConfigError::UnknownBackend {
                name: pubsub_name.to_string(),
                declared: self.backends.keys().cloned().collect::<Vec<_>>().join(", "),
            });
        }

        Ok(self.backends.clone())
    }

    /// Logging configuration with the command-line level applied.
    pub fn logging_with(&self, overrides: &Overrides) -> LoggingConfig {
        match &overrides.log_level {
            Some(level) => LoggingConfig {
                level: level.clone(),
                format: self.logging.format,
            },
            None => self.logging.clone(),
        }
    }
}
