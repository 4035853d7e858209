//! Reading generation.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use sensorsim_common::{SensorReading, current_timestamp_millis};

use crate::config::GeneratorConfig;
use crate::error::ConfigError;

/// Produces one reading per tick.
///
/// Called on every tick, so implementations must be cheap and must not
/// block.
pub trait ReadingGenerator: Send {
    fn generate(&mut self) -> SensorReading;
}

/// Bounded random walk around a base temperature.
///
/// Timestamps are strictly increasing across calls, even when several
/// readings are generated within the same millisecond.
pub struct SimulatedTemperature {
    rng: SmallRng,
    sensor_id: String,
    temperature: f64,
    min: f64,
    max: f64,
    max_step: f64,
    sequence: u64,
    last_timestamp: i64,
}

impl SimulatedTemperature {
    /// Create a generator from validated settings.
    pub fn new(config: &GeneratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: &GeneratorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        Self {
            rng,
            sensor_id: config.sensor_id.clone(),
            temperature: config.base,
            min: config.min,
            max: config.max,
            max_step: config.max_step,
            sequence: 0,
            last_timestamp: i64::MIN,
        }
    }

    fn next_timestamp(&mut self) -> i64 {
        let now = current_timestamp_millis();
        let timestamp = if now > self.last_timestamp {
            now
        } else {
            self.last_timestamp + 1
        };
        self.last_timestamp = timestamp;
        timestamp
    }
}

impl Default for SimulatedTemperature {
    fn default() -> Self {
        Self::from_valid(&GeneratorConfig::default())
    }
}

impl ReadingGenerator for SimulatedTemperature {
    fn generate(&mut self) -> SensorReading {
        let step = self.rng.random_range(-self.max_step..=self.max_step);
        self.temperature = (self.temperature + step).clamp(self.min, self.max);
        self.sequence += 1;

        let timestamp = self.next_timestamp();
        SensorReading::new(self.sensor_id.clone(), self.temperature)
            .with_timestamp(timestamp)
            .with_sequence(self.sequence)
    }
}
