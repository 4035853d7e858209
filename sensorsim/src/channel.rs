//! Publish channels.
//!
//! The publisher loop only sees [`PublishChannel`]. The binary hands it a
//! [`BackendRegistry`], which routes each publish to the backend named by
//! the pub/sub name.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use sensorsim_common::{ZenohConfig, build_key, connect, decode_auto};

use crate::config::BackendConfig;
use crate::error::{Error, PublishError};

/// Capability to publish one message to a topic through a named backend.
///
/// At most one publish is in flight at a time, so implementations need no
/// internal locking for that purpose.
pub trait PublishChannel: Send + Sync {
    /// Publish `payload` to `topic` through the backend `pubsub_name`.
    fn publish(
        &self,
        pubsub_name: &str,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;

    /// Release held connections. Publishing after close fails.
    fn close(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Publishes through a Zenoh session.
#[derive(Debug, Clone)]
pub struct ZenohChannel {
    name: String,
    session: Arc<zenoh::Session>,
    key_prefix: String,
}

impl ZenohChannel {
    /// Wrap an open session.
    pub fn new(
        name: impl Into<String>,
        session: Arc<zenoh::Session>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            session,
            key_prefix: key_prefix.into(),
        }
    }

    /// Open a session for the backend `name`.
    pub async fn connect(
        name: impl Into<String>,
        config: &ZenohConfig,
        key_prefix: impl Into<String>,
    ) -> Result<Self, Error> {
        let name = name.into();
        let session = connect(config).await.map_err(|e| Error::Connect {
            backend: name.clone(),
            message: e.to_string(),
        })?;
        Ok(Self::new(name, Arc::new(session), key_prefix))
    }

    /// Get a reference to the Zenoh session.
    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    /// Key expression a topic is published to.
    pub fn key_for(&self, topic: &str) -> String {
        build_key(&self.key_prefix, topic)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let key = self.key_for(topic);

        self.session
            .put(&key, payload)
            .await
            .map_err(|e| PublishError::Transport {
                backend: self.name.clone(),
                key: key.clone(),
                message: e.to_string(),
            })
    }

    async fn close(&self) {
        if let Err(e) = self.session.close().await {
            warn!(backend = %self.name, error = %e, "Error closing Zenoh session");
        }
    }
}

/// Writes each message to the log instead of a bus.
#[derive(Debug, Clone)]
pub struct LogChannel {
    name: String,
}

impl LogChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn publish(&self, topic: &str, payload: &[u8]) {
        match decode_auto::<serde_json::Value>(payload) {
            Ok(value) => info!(backend = %self.name, topic, message = %value, "Published"),
            Err(_) => info!(
                backend = %self.name,
                topic,
                bytes = payload.len(),
                "Published opaque payload"
            ),
        }
    }
}

/// A configured pub/sub backend.
#[derive(Debug)]
pub enum Backend {
    Zenoh(ZenohChannel),
    Log(LogChannel),
}

impl Backend {
    /// Open the backend described by `config`.
    pub async fn open(name: &str, config: &BackendConfig) -> Result<Self, Error> {
        match config {
            BackendConfig::Zenoh { zenoh, key_prefix } => Ok(Backend::Zenoh(
                ZenohChannel::connect(name, zenoh, key_prefix.clone()).await?,
            )),
            BackendConfig::Log => Ok(Backend::Log(LogChannel::new(name))),
        }
    }

    /// Backend type as written in configuration.
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Zenoh(_) => "zenoh",
            Backend::Log(_) => "log",
        }
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        match self {
            Backend::Zenoh(channel) => channel.publish(topic, payload).await,
            Backend::Log(channel) => {
                channel.publish(topic, &payload);
                Ok(())
            }
        }
    }

    async fn close(&self) {
        if let Backend::Zenoh(channel) = self {
            channel.close().await;
        }
    }
}

/// Named backends, selected per publish by pub/sub name.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Backend>,
    closed: bool,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open every configured backend.
    ///
    /// If one fails, the ones already opened are closed before returning.
    pub async fn open(configs: &BTreeMap<String, BackendConfig>) -> Result<Self, Error> {
        let mut registry = Self::new();

        for (name, config) in configs {
            match Backend::open(name, config).await {
                Ok(backend) => {
                    info!(backend = %name, kind = backend.kind(), "Backend ready");
                    registry.insert(name.clone(), backend);
                }
                Err(e) => {
                    registry.close().await;
                    return Err(e);
                }
            }
        }

        Ok(registry)
    }

    /// Register a backend under `name`, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, backend: Backend) {
        self.backends.insert(name.into(), backend);
    }

    /// Look up a backend by name.
    pub fn get(&self, name: &str) -> Option<&Backend> {
        self.backends.get(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl PublishChannel for BackendRegistry {
    async fn publish(
        &self,
        pubsub_name: &str,
        topic: &str,
        payload: Vec<u8>,
    ) -> Result<(), PublishError> {
        if self.closed {
            return Err(PublishError::Closed {
                backend: pubsub_name.to_string(),
            });
        }

        let backend = self
            .backends
            .get(pubsub_name)
            .ok_or_else(|| PublishError::UnknownBackend {
                backend: pubsub_name.to_string(),
            })?;

        backend.publish(topic, payload).await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        for (name, backend) in &self.backends {
            debug!(backend = %name, "Closing backend");
            backend.close().await;
        }
        self.closed = true;
    }
}
