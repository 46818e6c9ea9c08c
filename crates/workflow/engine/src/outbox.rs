//! Transition outbox: pending side-effect and audit intents
//!
//! The executor persists the mutated instance together with its
//! side-effect intents in one atomic repository write, then drains the
//! fresh entries inline. Entries a crash leaves `Pending` are picked
//! up later by the relay worker, so a committed transition can lose
//! neither its publish action nor its audit event.

use crate::ports::{AuditSink, ContentPublisher};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use workflow_types::{ContentId, InstanceId, StateChangeEvent};

// ── Intent ───────────────────────────────────────────────────────────

/// The deferred action an outbox entry stands for
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum OutboxIntent {
    /// Publish the content item
    Publish {
        content_id: ContentId,
        content_type: String,
    },
    /// Unpublish the content item
    Unpublish {
        content_id: ContentId,
        content_type: String,
    },
    /// Emit the state-change event onto the audit pipeline
    Audit { event: StateChangeEvent },
}

impl OutboxIntent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Publish { .. } => "publish",
            Self::Unpublish { .. } => "unpublish",
            Self::Audit { .. } => "audit",
        }
    }
}

// ── Entry ────────────────────────────────────────────────────────────

/// Processing status of an outbox entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutboxStatus {
    /// Not yet applied; the relay will retry it
    #[default]
    Pending,
    /// Applied successfully
    Done,
    /// Given up after exhausting relay attempts
    Failed,
}

/// One pending side-effect or audit intent, committed atomically with
/// the instance it belongs to
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: String,
    pub instance_id: InstanceId,
    pub intent: OutboxIntent,
    pub status: OutboxStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboxEntry {
    pub fn new(instance_id: InstanceId, intent: OutboxIntent) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            instance_id,
            intent,
            status: OutboxStatus::Pending,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_done(&mut self) {
        self.status = OutboxStatus::Done;
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self) {
        self.status = OutboxStatus::Failed;
        self.updated_at = Utc::now();
    }

    pub fn record_attempt(&mut self) {
        self.attempts += 1;
        self.updated_at = Utc::now();
    }
}

// ── Drain ────────────────────────────────────────────────────────────

/// Apply one intent through the collaborator ports.
///
/// Returns whether the action succeeded; the caller updates the entry.
pub async fn apply_intent<P, A>(publisher: &P, audit: &A, intent: &OutboxIntent) -> bool
where
    P: ContentPublisher + ?Sized,
    A: AuditSink + ?Sized,
{
    match intent {
        OutboxIntent::Publish {
            content_id,
            content_type,
        } => publisher.publish(content_id, content_type).await,
        OutboxIntent::Unpublish {
            content_id,
            content_type,
        } => publisher.unpublish(content_id, content_type).await,
        OutboxIntent::Audit { event } => audit.publish(event).await,
    }
}
