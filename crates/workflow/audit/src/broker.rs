//! Shared broker connection
//!
//! One `BrokerConnection` is held per process. The underlying client
//! is created lazily on first use, recreated on demand if the
//! connection was closed, and drained exactly once on shutdown.

use crate::config::BrokerConfig;
use crate::error::{AuditError, AuditResult};
use async_nats::jetstream::stream::{Config as StreamConfig, RetentionPolicy, Stream};
use async_nats::jetstream::{self, Context as JetStreamContext};
use async_nats::connection::State as ConnectionState;
use async_nats::Client;
use tokio::sync::Mutex;

/// Lazily-connected handle to the audit broker
pub struct BrokerConnection {
    config: BrokerConfig,
    inner: Mutex<Option<(Client, JetStreamContext)>>,
}

impl BrokerConnection {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// The JetStream context, connecting or reconnecting as needed
    pub async fn context(&self) -> AuditResult<JetStreamContext> {
        let mut inner = self.inner.lock().await;
        if let Some((client, context)) = inner.as_ref() {
            if client.connection_state() != ConnectionState::Disconnected {
                return Ok(context.clone());
            }
            tracing::warn!(url = %self.config.url, "Broker connection lost; reconnecting");
            *inner = None;
        }

        let client = async_nats::connect(&self.config.url)
            .await
            .map_err(|e| AuditError::Connection(e.to_string()))?;
        let context = jetstream::new(client.clone());
        tracing::info!(url = %self.config.url, "Connected to audit broker");
        *inner = Some((client, context.clone()));
        Ok(context)
    }

    /// Idempotently declare the durable audit stream bound to the
    /// configured subject
    pub async fn ensure_topology(&self) -> AuditResult<Stream> {
        let context = self.context().await?;
        context
            .get_or_create_stream(StreamConfig {
                name: self.config.stream_name.clone(),
                subjects: vec![self.config.subject.clone()],
                retention: RetentionPolicy::WorkQueue,
                max_messages: self.config.max_messages,
                ..Default::default()
            })
            .await
            .map_err(|e| AuditError::Connection(e.to_string()))
    }

    /// Drain and drop the connection. Safe to call more than once;
    /// only the first call does anything.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if let Some((client, _)) = inner.take() {
            if let Err(e) = client.drain().await {
                tracing::warn!(error = %e, "Broker drain failed during shutdown");
            } else {
                tracing::info!("Audit broker connection closed");
            }
        }
    }
}
