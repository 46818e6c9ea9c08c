//! Audit event producer
//!
//! Publishes state-change events to the broker fire-and-forget: the
//! transition that triggered the event is already committed, so a
//! delivery failure is logged and reported as `false`, never raised.

use crate::broker::BrokerConnection;
use crate::error::{AuditError, AuditResult};
use async_trait::async_trait;
use std::sync::Arc;
use workflow_engine::ports::AuditSink;
use workflow_types::StateChangeEvent;

/// Broker-backed implementation of the engine's audit sink
pub struct AuditEventPublisher {
    connection: Arc<BrokerConnection>,
}

impl AuditEventPublisher {
    pub fn new(connection: Arc<BrokerConnection>) -> Self {
        Self { connection }
    }

    /// Serialize and hand the event to the broker.
    ///
    /// Serialization failures are [`AuditError::MessageFormat`],
    /// broker failures [`AuditError::Connection`] or
    /// [`AuditError::Delivery`]. No confirm-wait: the publish future
    /// resolving means the message was handed to the broker.
    pub async fn try_publish(&self, event: &StateChangeEvent) -> AuditResult<()> {
        let payload = event
            .to_json_vec()
            .map_err(|e| AuditError::MessageFormat(e.to_string()))?;
        let context = self.connection.context().await?;
        let subject = self.connection.config().subject.clone();
        context
            .publish(subject, payload.into())
            .await
            .map_err(|e| AuditError::Delivery(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for AuditEventPublisher {
    async fn publish(&self, event: &StateChangeEvent) -> bool {
        match self.try_publish(event).await {
            Ok(()) => {
                tracing::debug!(
                    content_id = %event.content_id,
                    from = %event.from_state,
                    to = %event.to_state,
                    "Audit event published"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    content_id = %event.content_id,
                    error = %e,
                    "Failed to publish audit event"
                );
                false
            }
        }
    }
}
