//! Workflow error taxonomy
//!
//! Validation, not-found, conflict, and authorization errors abort an
//! operation before any mutation and surface synchronously. Publish
//! side effects and audit delivery fail soft: they are reported as
//! boolean flags on the transition outcome, never as errors here.

use crate::id::{DefinitionId, InstanceId, RuleId, StateId};
use thiserror::Error;

/// Errors surfaced by the workflow core
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// Malformed input, missing required comment, inactive rule, or a
    /// structurally invalid definition
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("workflow definition '{0}' not found")]
    DefinitionNotFound(DefinitionId),

    #[error("workflow state '{0}' not found")]
    StateNotFound(StateId),

    #[error("transition rule '{0}' not found")]
    RuleNotFound(RuleId),

    #[error("workflow instance '{0}' not found")]
    InstanceNotFound(InstanceId),

    /// The rule departs from a state other than the instance's current
    /// state
    #[error("rule departs from state '{expected}' but instance is at '{actual}'")]
    StateConflict { expected: StateId, actual: StateId },

    /// Optimistic concurrency check failed on save; the caller should
    /// reload and retry
    #[error(
        "instance '{instance}' was modified concurrently \
         (expected version {expected}, found {found})"
    )]
    VersionConflict {
        instance: InstanceId,
        expected: u64,
        found: u64,
    },

    /// Caller roles do not intersect the rule's allowed roles
    #[error("caller roles do not satisfy transition rule '{0}'")]
    Unauthorized(RuleId),

    /// Backing store failure outside the domain's control
    #[error("repository error: {0}")]
    Repository(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_entity() {
        let err = WorkflowError::InstanceNotFound(InstanceId::new("inst-1"));
        assert!(err.to_string().contains("inst-1"));

        let err = WorkflowError::StateConflict {
            expected: StateId::new("review"),
            actual: StateId::new("draft"),
        };
        let text = err.to_string();
        assert!(text.contains("review"));
        assert!(text.contains("draft"));
    }

    #[test]
    fn test_version_conflict_reports_versions() {
        let err = WorkflowError::VersionConflict {
            instance: InstanceId::new("inst-1"),
            expected: 3,
            found: 4,
        };
        let text = err.to_string();
        assert!(text.contains("expected version 3"));
        assert!(text.contains("found 4"));
    }
}
