//! Sensorsim Common Library
//!
//! Shared types and utilities for the simulated sensor publisher and for
//! anything that consumes its readings:
//!
//! - [`reading`] - The `SensorReading` data model
//! - [`serialization`] - JSON/CBOR encoding and decoding
//! - [`config`] - Zenoh and logging configuration sections
//! - [`session`] - Zenoh session management
//! - [`keyexpr`] - Key expression building and topic validation
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod keyexpr;
pub mod reading;
pub mod serialization;
pub mod session;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, ZenohConfig};
pub use error::{Error, Result};
pub use keyexpr::{build_key, validate_topic};
pub use reading::{SensorReading, current_timestamp_millis};
pub use serialization::{Format, decode, decode_auto, encode};
pub use session::connect;

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level when set.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// # Example
///
/// ```ignore
/// use sensorsim_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            Error::Config(format!("Invalid log level '{}': {}", config.level, e))
        })?,
    };

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
