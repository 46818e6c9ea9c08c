//! Background audit message consumer
//!
//! One long-lived loop pulls state-change events from the durable
//! stream with explicit acknowledgment, strictly one message in
//! flight. Undeserializable payloads are poison and get terminated
//! immediately; handler failures retry a bounded number of times with
//! a fixed delay, then the message is terminated with full context
//! logged. The retry core (`dispose`) is transport-free so it can be
//! exercised without a broker.

use crate::broker::BrokerConnection;
use crate::config::AuditConsumerConfig;
use crate::error::{AuditError, AuditResult};
use async_nats::jetstream::consumer::pull::Config as PullConsumerConfig;
use async_nats::jetstream::consumer::AckPolicy;
use async_nats::jetstream::AckKind;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use workflow_engine::ports::{counters, MetricsRecorder, NoopMetrics};
use workflow_types::StateChangeEvent;

// ── Handler ──────────────────────────────────────────────────────────

/// Downstream processing of one decoded state-change event
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, event: &StateChangeEvent) -> AuditResult<()>;
}

// ── Disposition ──────────────────────────────────────────────────────

/// What the consumer loop should do with a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; acknowledge it
    Ack,
    /// Poison or retries exhausted; terminate without requeue
    Reject,
    /// Shutdown interrupted processing; leave unacknowledged so the
    /// broker redelivers it after restart
    Release,
}

/// Decode a broker payload into a state-change event.
///
/// Failures are [`AuditError::MessageFormat`]: the payload is poison
/// and must never be retried.
fn decode_event(payload: &[u8]) -> AuditResult<StateChangeEvent> {
    StateChangeEvent::from_json_slice(payload)
        .map_err(|e| AuditError::MessageFormat(e.to_string()))
}

// ── Consumer ─────────────────────────────────────────────────────────

/// Sequential consumer of the audit stream
pub struct AuditMessageConsumer<H> {
    connection: Arc<BrokerConnection>,
    config: AuditConsumerConfig,
    handler: Arc<H>,
    shutdown: watch::Receiver<bool>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl<H> AuditMessageConsumer<H>
where
    H: NotificationHandler,
{
    pub fn new(
        connection: Arc<BrokerConnection>,
        config: AuditConsumerConfig,
        handler: Arc<H>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            connection,
            config,
            handler,
            shutdown,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Decide the fate of one payload.
    ///
    /// Transport-free: decoding, the retry loop, and the shutdown
    /// check all happen here; [`Self::run`] only maps the disposition
    /// onto broker acknowledgments.
    pub async fn dispose(&self, payload: &[u8]) -> Disposition {
        let event = match decode_event(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    payload_len = payload.len(),
                    "Poison audit message; terminating without retry"
                );
                self.metrics.incr(counters::AUDIT_MESSAGES_POISON);
                return Disposition::Reject;
            }
        };

        // A bound of zero would terminate well-formed messages without
        // ever invoking the handler
        let max_attempts = self.config.max_retry_attempts.max(1);
        let mut shutdown = self.shutdown.clone();
        for attempt in 1..=max_attempts {
            if *shutdown.borrow() {
                return Disposition::Release;
            }
            match self.handler.handle(&event).await {
                Ok(()) => {
                    self.metrics.incr(counters::AUDIT_MESSAGES_ACKED);
                    return Disposition::Ack;
                }
                Err(e) => {
                    tracing::warn!(
                        content_id = %event.content_id,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Audit message processing failed"
                    );
                    if attempt == max_attempts {
                        break;
                    }
                    if self.wait_for_retry(&mut shutdown).await {
                        return Disposition::Release;
                    }
                }
            }
        }

        tracing::error!(
            content_id = %event.content_id,
            from = %event.from_state,
            to = %event.to_state,
            attempts = max_attempts,
            "Audit message retries exhausted; terminating"
        );
        self.metrics.incr(counters::AUDIT_MESSAGES_DROPPED);
        Disposition::Reject
    }

    /// Sleep out the retry delay; returns true if shutdown was
    /// signalled. Watch sends that leave the flag false do not cut
    /// the delay short.
    async fn wait_for_retry(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let delay = tokio::time::sleep(self.config.retry_delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => return false,
                changed = shutdown.changed() => {
                    match changed {
                        Ok(()) if *shutdown.borrow() => return true,
                        Ok(()) => {}
                        // Sender gone; no shutdown can arrive anymore
                        Err(_) => {
                            delay.as_mut().await;
                            return false;
                        }
                    }
                }
            }
        }
    }

    /// Consume until the shutdown signal flips.
    ///
    /// Declares the stream topology and a durable pull consumer, then
    /// processes messages strictly sequentially.
    pub async fn run(&self) -> AuditResult<()> {
        let stream = self.connection.ensure_topology().await?;
        let consumer = stream
            .get_or_create_consumer(
                &self.config.durable_name,
                PullConsumerConfig {
                    durable_name: Some(self.config.durable_name.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| AuditError::Connection(e.to_string()))?;

        let mut messages = consumer
            .messages()
            .await
            .map_err(|e| AuditError::Connection(e.to_string()))?;

        tracing::info!(
            durable_name = %self.config.durable_name,
            "Audit consumer started"
        );

        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                message = messages.next() => {
                    let message = match message {
                        Some(Ok(message)) => message,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Audit stream pull failed");
                            continue;
                        }
                        None => break,
                    };
                    match self.dispose(&message.payload).await {
                        Disposition::Ack => {
                            if let Err(e) = message.ack().await {
                                tracing::warn!(error = %e, "Audit message ack failed");
                            }
                        }
                        Disposition::Reject => {
                            if let Err(e) = message.ack_with(AckKind::Term).await {
                                tracing::warn!(error = %e, "Audit message terminate failed");
                            }
                        }
                        Disposition::Release => break,
                    }
                }
            }
        }

        tracing::info!("Audit consumer stopped");
        Ok(())
    }
}
