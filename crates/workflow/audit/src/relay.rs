//! Outbox relay worker
//!
//! The executor drains outbox entries inline right after a commit; a
//! crash between commit and drain leaves entries Pending. This worker
//! scans for them on an interval and re-applies the intents through
//! the same ports, so a committed transition eventually gets its
//! publish action and audit event. Attempts are bounded; entries that
//! keep failing are marked Failed and surface in the logs.

use crate::config::RelayConfig;
use std::sync::Arc;
use tokio::sync::watch;
use workflow_engine::outbox::{apply_intent, OutboxIntent};
use workflow_engine::ports::{
    counters, AuditSink, ContentPublisher, MetricsRecorder, NoopMetrics, WorkflowRepository,
};
use workflow_types::WorkflowResult;

/// Background worker re-draining crash-left outbox entries
pub struct OutboxRelay<R, P, A> {
    repository: Arc<R>,
    publisher: Arc<P>,
    audit: Arc<A>,
    config: RelayConfig,
    shutdown: watch::Receiver<bool>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl<R, P, A> OutboxRelay<R, P, A>
where
    R: WorkflowRepository,
    P: ContentPublisher,
    A: AuditSink,
{
    pub fn new(
        repository: Arc<R>,
        publisher: Arc<P>,
        audit: Arc<A>,
        config: RelayConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            repository,
            publisher,
            audit,
            config,
            shutdown,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Drain one batch of pending entries; returns how many were
    /// resolved (marked Done or Failed)
    pub async fn drain_once(&self) -> WorkflowResult<usize> {
        let entries = self.repository.pending_outbox(self.config.batch_size).await?;
        let mut resolved = 0;

        for mut entry in entries {
            entry.record_attempt();
            let ok = apply_intent(
                self.publisher.as_ref(),
                self.audit.as_ref(),
                &entry.intent,
            )
            .await;

            if ok {
                entry.mark_done();
                resolved += 1;
                tracing::info!(
                    instance_id = %entry.instance_id,
                    intent = entry.intent.kind(),
                    attempts = entry.attempts,
                    "Relayed outbox entry"
                );
            } else {
                match entry.intent {
                    OutboxIntent::Audit { .. } => {
                        self.metrics.incr(counters::AUDIT_PUBLISH_FAILURES)
                    }
                    _ => self.metrics.incr(counters::SIDE_EFFECT_FAILURES),
                }
                if entry.attempts >= self.config.max_attempts {
                    entry.mark_failed();
                    resolved += 1;
                    tracing::error!(
                        instance_id = %entry.instance_id,
                        intent = entry.intent.kind(),
                        attempts = entry.attempts,
                        "Outbox entry failed permanently"
                    );
                } else {
                    tracing::warn!(
                        instance_id = %entry.instance_id,
                        intent = entry.intent.kind(),
                        attempts = entry.attempts,
                        "Outbox entry still failing; will retry"
                    );
                }
            }
            self.repository.update_outbox_entry(&entry).await?;
        }

        Ok(resolved)
    }

    /// Scan on the configured interval until the shutdown signal flips
    pub async fn run(&self) {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Outbox relay started"
        );
        let mut shutdown = self.shutdown.clone();
        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.drain_once().await {
                tracing::warn!(error = %e, "Outbox relay scan failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Outbox relay stopped");
    }
}
