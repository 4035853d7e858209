use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single reading emitted by a simulated sensor.
///
/// Readings are created once per tick and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Unix epoch milliseconds when the reading was generated.
    pub timestamp: i64,

    /// Simulated temperature (unit-less).
    pub temperature: f64,

    /// Identifier of the sensor that produced the reading.
    pub source: String,

    /// Per-run tick counter, starting at 1.
    ///
    /// Lets consumers detect dropped readings.
    #[serde(default)]
    pub sequence: u64,
}

impl SensorReading {
    /// Create a reading stamped with the current time.
    pub fn new(source: impl Into<String>, temperature: f64) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            temperature,
            source: source.into(),
            sequence: 0,
        }
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
