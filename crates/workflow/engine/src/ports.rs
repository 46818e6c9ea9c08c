//! Collaborator contracts consumed by the engine
//!
//! The core owns the transition semantics; everything at the boundary
//! (the CMS publish pipeline, the backing store, the audit broker,
//! metrics) is reached through these narrow interfaces. Adapters live
//! with the infrastructure that implements them; deterministic
//! in-memory versions for tests and local development are in
//! [`crate::memory`].

use crate::outbox::OutboxEntry;
use async_trait::async_trait;
use workflow_types::{
    ContentId, DefinitionId, InstanceId, StateChangeEvent, WorkflowDefinition, WorkflowInstance,
    WorkflowResult,
};

// ── Content Publisher ────────────────────────────────────────────────

/// The CMS publish pipeline.
///
/// Both calls are no-op successes when the content item is already in
/// the target state. Failures are reported as `false`, never raised:
/// publish side effects sit in their own failure domain.
#[async_trait]
pub trait ContentPublisher: Send + Sync {
    async fn publish(&self, content_id: &ContentId, content_type: &str) -> bool;
    async fn unpublish(&self, content_id: &ContentId, content_type: &str) -> bool;
}

// ── Audit Sink ───────────────────────────────────────────────────────

/// Destination of state-change events.
///
/// Implementations serialize and deliver the event to the audit
/// broker. Returns `false` on any serialization or delivery error;
/// the caller logs and proceeds.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn publish(&self, event: &StateChangeEvent) -> bool;
}

// ── Workflow Repository ──────────────────────────────────────────────

/// Durable store for definitions, instances, and the transition
/// outbox.
///
/// No transaction semantics are assumed beyond single-call atomicity;
/// `save_instance_with_outbox` is the one composite write and is the
/// durability boundary of a transition. Instance saves are
/// compare-and-swap on the caller-supplied expected version and fail
/// with a version conflict on mismatch.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn load_definition(&self, id: &DefinitionId) -> WorkflowResult<WorkflowDefinition>;
    async fn find_definition_by_name(&self, name: &str)
        -> WorkflowResult<Option<WorkflowDefinition>>;
    async fn save_definition(&self, definition: &WorkflowDefinition) -> WorkflowResult<()>;
    async fn delete_definition(&self, id: &DefinitionId) -> WorkflowResult<()>;

    async fn load_instance(&self, id: &InstanceId) -> WorkflowResult<WorkflowInstance>;
    /// The Active instance governing a content item, if one exists
    async fn active_instance_for_content(
        &self,
        content_id: &ContentId,
    ) -> WorkflowResult<Option<WorkflowInstance>>;
    /// True if any instance references the definition
    async fn has_instances(&self, definition_id: &DefinitionId) -> WorkflowResult<bool>;
    /// True if any Active instance references the definition
    async fn has_active_instances(&self, definition_id: &DefinitionId) -> WorkflowResult<bool>;

    /// Compare-and-swap save: `expected_version` is the version the
    /// caller loaded; a stored version that differs fails with
    /// `VersionConflict`. A fresh instance saves with expected
    /// version 0.
    async fn save_instance(
        &self,
        instance: &WorkflowInstance,
        expected_version: u64,
    ) -> WorkflowResult<()>;

    /// Atomically save the instance and enqueue its outbox entries
    async fn save_instance_with_outbox(
        &self,
        instance: &WorkflowInstance,
        expected_version: u64,
        entries: &[OutboxEntry],
    ) -> WorkflowResult<()>;

    /// Oldest pending outbox entries, up to `limit`
    async fn pending_outbox(&self, limit: usize) -> WorkflowResult<Vec<OutboxEntry>>;
    async fn update_outbox_entry(&self, entry: &OutboxEntry) -> WorkflowResult<()>;
}

// ── Metrics Recorder ─────────────────────────────────────────────────

/// Injected counter sink.
///
/// Scoped to the service instance that owns it rather than a
/// process-global registry.
pub trait MetricsRecorder: Send + Sync {
    fn incr(&self, counter: &'static str);
}

/// Counter names recorded by the engine and the audit pipeline
pub mod counters {
    pub const TRANSITIONS_APPLIED: &str = "workflow.transitions.applied";
    pub const TRANSITIONS_REJECTED: &str = "workflow.transitions.rejected";
    pub const TRANSITIONS_DENIED: &str = "workflow.transitions.denied";
    pub const SIDE_EFFECT_FAILURES: &str = "workflow.side_effects.failed";
    pub const AUDIT_PUBLISH_FAILURES: &str = "workflow.audit.publish_failed";
    pub const AUDIT_MESSAGES_ACKED: &str = "workflow.audit.messages_acked";
    pub const AUDIT_MESSAGES_POISON: &str = "workflow.audit.messages_poison";
    pub const AUDIT_MESSAGES_DROPPED: &str = "workflow.audit.messages_dropped";
}

/// Discards every counter
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn incr(&self, _counter: &'static str) {}
}
