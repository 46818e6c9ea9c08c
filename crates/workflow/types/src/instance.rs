//! Workflow instances: the live binding of content to a definition
//!
//! An instance tracks one content item's position in an approval
//! graph. It is mutated only through validated transitions; every
//! applied transition appends an entry to the instance's transition
//! log. The `version` field is a monotonic concurrency token: saves
//! are compare-and-swap against it, so concurrent transitions on the
//! same instance surface as a version conflict instead of a lost
//! update.

use crate::id::{ContentId, DefinitionId, InstanceId, RuleId, StateId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Instance Status ──────────────────────────────────────────────────

/// Lifecycle status of a workflow instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InstanceStatus {
    /// Moving through the graph
    #[default]
    Active,
    /// A final state was reached
    Completed,
    /// Cancelled by an authorized actor
    Cancelled,
}

// ── Transition Log ───────────────────────────────────────────────────

/// One entry of the instance's free-form transition log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionLogEntry {
    /// Symbolic key of the state left
    pub from: String,
    /// Symbolic key of the state entered
    pub to: String,
    /// The rule that was applied; absent for forced rejections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<RuleId>,
    /// Who applied the transition
    pub actor: String,
    /// Reviewer comment, when one was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// True for the dedicated reject operation
    #[serde(default)]
    pub rejected: bool,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
}

// ── Workflow Instance ────────────────────────────────────────────────

/// The live binding of one content item to a workflow definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Unique identifier
    pub id: InstanceId,
    /// The governed content item
    pub content_id: ContentId,
    /// Display name of the content item, carried into audit events
    pub content_name: String,
    /// Content type discriminator (page, post, ...)
    pub content_type: String,
    /// The definition whose graph governs this instance
    pub definition_id: DefinitionId,
    /// The state the instance currently sits in
    pub current_state: StateId,
    /// Lifecycle status
    pub status: InstanceStatus,
    /// Free-form log of applied transitions
    pub transitions: Vec<TransitionLogEntry>,
    /// Monotonic concurrency token, bumped on every save
    pub version: u64,
    /// Who created the instance
    pub created_by: String,
    /// When the instance was created
    pub created_at: DateTime<Utc>,
    /// When the instance last changed
    pub last_modified: DateTime<Utc>,
}

impl WorkflowInstance {
    /// Create a new instance sitting in the given initial state
    pub fn new(
        definition_id: DefinitionId,
        initial_state: StateId,
        content_id: ContentId,
        content_name: impl Into<String>,
        content_type: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: InstanceId::generate(),
            content_id,
            content_name: content_name.into(),
            content_type: content_type.into(),
            definition_id,
            current_state: initial_state,
            status: InstanceStatus::Active,
            transitions: Vec::new(),
            version: 0,
            created_by: created_by.into(),
            created_at: now,
            last_modified: now,
        }
    }

    /// Move to a new state and append the corresponding log entry.
    ///
    /// `is_final` reflects the target state's flag; reaching a final
    /// state completes the instance, while a rejection back into the
    /// graph reactivates it.
    pub fn enter_state(&mut self, target: StateId, entry: TransitionLogEntry, is_final: bool) {
        self.current_state = target;
        self.status = if is_final {
            InstanceStatus::Completed
        } else {
            InstanceStatus::Active
        };
        self.transitions.push(entry);
        self.last_modified = Utc::now();
    }

    /// Cancel the instance
    pub fn cancel(&mut self) {
        self.status = InstanceStatus::Cancelled;
        self.last_modified = Utc::now();
    }

    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::Active
    }

    /// The most recent transition, if any was applied
    pub fn last_transition(&self) -> Option<&TransitionLogEntry> {
        self.transitions.last()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_instance() -> WorkflowInstance {
        WorkflowInstance::new(
            DefinitionId::new("def-1"),
            StateId::new("draft"),
            ContentId::new("content-1"),
            "Launch announcement",
            "post",
            "alice",
        )
    }

    fn entry(from: &str, to: &str) -> TransitionLogEntry {
        TransitionLogEntry {
            from: from.into(),
            to: to.into(),
            rule_id: Some(RuleId::new("rule-1")),
            actor: "bob".into(),
            comment: None,
            rejected: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_new_instance_is_active_at_version_zero() {
        let inst = make_instance();
        assert_eq!(inst.status, InstanceStatus::Active);
        assert!(inst.is_active());
        assert_eq!(inst.version, 0);
        assert_eq!(inst.current_state, StateId::new("draft"));
        assert_eq!(inst.transition_count(), 0);
    }

    #[test]
    fn test_enter_state_appends_log() {
        let mut inst = make_instance();
        inst.enter_state(StateId::new("review"), entry("draft", "review"), false);

        assert_eq!(inst.current_state, StateId::new("review"));
        assert!(inst.is_active());
        assert_eq!(inst.transition_count(), 1);
        assert_eq!(inst.last_transition().unwrap().to, "review");
    }

    #[test]
    fn test_entering_final_state_completes() {
        let mut inst = make_instance();
        inst.enter_state(StateId::new("published"), entry("draft", "published"), true);
        assert_eq!(inst.status, InstanceStatus::Completed);
        assert!(!inst.is_active());
    }

    #[test]
    fn test_rejection_from_final_state_reactivates() {
        let mut inst = make_instance();
        inst.enter_state(StateId::new("published"), entry("draft", "published"), true);
        inst.enter_state(StateId::new("draft"), entry("published", "draft"), false);
        assert_eq!(inst.status, InstanceStatus::Active);
    }

    #[test]
    fn test_cancel() {
        let mut inst = make_instance();
        inst.cancel();
        assert_eq!(inst.status, InstanceStatus::Cancelled);
        assert!(!inst.is_active());
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut inst = make_instance();
        inst.enter_state(StateId::new("review"), entry("draft", "review"), false);

        let json = serde_json::to_string(&inst).unwrap();
        let back: WorkflowInstance = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, inst.id);
        assert_eq!(back.current_state, inst.current_state);
        assert_eq!(back.transition_count(), 1);
    }
}
