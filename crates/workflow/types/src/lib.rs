//! Domain types for the content-approval workflow engine
//!
//! A [`WorkflowDefinition`] is a directed graph of editor-defined
//! [`WorkflowState`]s connected by role-gated [`TransitionRule`]s.
//! A [`WorkflowInstance`] binds one content item to a definition and
//! tracks its current state; every applied transition appends to the
//! instance's transition log and emits a [`StateChangeEvent`] onto the
//! audit pipeline, where it is persisted as an [`AuditRecord`].
//!
//! Definitions are structurally immutable once instances reference
//! them; only metadata edits remain allowed.

#![deny(unsafe_code)]

pub mod definition;
pub mod error;
pub mod event;
pub mod id;
pub mod instance;
pub mod rule;

pub use definition::{WorkflowDefinition, WorkflowState};
pub use error::{WorkflowError, WorkflowResult};
pub use event::{AuditRecord, StateChangeEvent};
pub use id::{ContentId, DefinitionId, InstanceId, RuleId, StateId};
pub use instance::{InstanceStatus, TransitionLogEntry, WorkflowInstance};
pub use rule::{RoleSet, TransitionRule};
