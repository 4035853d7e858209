//! Error types for the sensor simulator.
//!
//! Only [`Error`] crosses the process boundary. [`PublishError`] is
//! absorbed by the publisher loop.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop the simulator before the publish loop starts.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A backend could not be connected.
    #[error("Failed to connect backend '{backend}': {message}")]
    Connect { backend: String, message: String },
}

/// Invalid configuration discovered at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    NotFound { path: String },

    /// Failed to read the configuration file.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] json5::Error),

    /// A value failed validation.
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The topic is not a concrete key expression.
    #[error(transparent)]
    Topic(#[from] sensorsim_common::Error),

    /// The selected pub/sub backend is not declared.
    #[error("Unknown pub/sub backend '{name}' (declared: {declared})")]
    UnknownBackend { name: String, declared: String },

    /// Logging could not be initialized.
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl ConfigError {
    /// Create a validation error for a named field.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// A single publish attempt failed.
#[derive(Error, Debug)]
pub enum PublishError {
    /// No backend is registered under this name.
    #[error("No pub/sub backend named '{backend}'")]
    UnknownBackend { backend: String },

    /// The backend has been closed.
    #[error("Backend '{backend}' is closed")]
    Closed { backend: String },

    /// The reading could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The transport rejected or failed to deliver the message.
    #[error("Failed to publish to {key} via '{backend}': {message}")]
    Transport {
        backend: String,
        key: String,
        message: String,
    },
}

impl From<sensorsim_common::Error> for PublishError {
    fn from(err: sensorsim_common::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
