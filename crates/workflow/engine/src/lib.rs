//! Transition engine for the content-approval workflow
//!
//! The engine decides whether a caller may move a content item along
//! an edge of its approval graph, commits the state change, and
//! orchestrates the decoupled side effects (content publish/unpublish,
//! audit emission). The instance commit is the durability boundary;
//! side effects run in their own failure domain and can never roll a
//! committed transition back.
//!
//! # Architecture
//!
//! - [`StateGraph`]: arena-indexed view of a definition's states and
//!   rules, O(1) lookup of the rules leaving a state
//! - [`TransitionAuthorizer`]: role-set evaluation for a rule
//! - [`TransitionExecutor`]: validation, authorization, mutation,
//!   outbox commit, inline side-effect drain
//! - [`WorkflowService`]: the operation surface consumed by the HTTP
//!   layer (kept outside this repository)
//! - [`ports`]: collaborator contracts for the content publisher,
//!   audit sink, repository, and metrics recorder
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use workflow_engine::memory::{InMemoryRepository, RecordingAuditSink, RecordingPublisher};
//! use workflow_engine::{Caller, WorkflowService};
//! use workflow_types::{ContentId, RoleSet, TransitionRule, WorkflowDefinition, WorkflowState};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let repository = Arc::new(InMemoryRepository::new());
//! let service = WorkflowService::new(
//!     repository,
//!     Arc::new(RecordingPublisher::new()),
//!     Arc::new(RecordingAuditSink::new()),
//! );
//!
//! let mut definition = WorkflowDefinition::new("Editorial Review");
//! definition.add_state(WorkflowState::new("draft", "Draft").initial()).unwrap();
//! definition.add_state(WorkflowState::new("review", "Review")).unwrap();
//! let draft = definition.state_by_key("draft").unwrap().id.clone();
//! let review = definition.state_by_key("review").unwrap().id.clone();
//! definition.add_rule(TransitionRule::new(draft, review)).unwrap();
//!
//! let definition_id = service.create_definition(definition).await.unwrap();
//! let instance = service
//!     .create_instance(&definition_id, ContentId::new("post-1"), "Post", "post", "alice")
//!     .await
//!     .unwrap();
//!
//! let rules = service.available_transitions(&instance.id).await.unwrap();
//! let caller = Caller::new("bob", ["Editor"]);
//! let outcome = service
//!     .apply_transition(&instance.id, &rules[0].id, &caller, None)
//!     .await
//!     .unwrap();
//! assert_eq!(outcome.instance.current_state, rules[0].to_state);
//! # });
//! ```

#![deny(unsafe_code)]

pub mod authorizer;
pub mod executor;
pub mod memory;
pub mod outbox;
pub mod ports;
pub mod service;
pub mod state_graph;

pub use authorizer::TransitionAuthorizer;
pub use executor::{Caller, TransitionExecutor, TransitionOutcome};
pub use outbox::{OutboxEntry, OutboxIntent, OutboxStatus};
pub use ports::{AuditSink, ContentPublisher, MetricsRecorder, NoopMetrics, WorkflowRepository};
pub use service::WorkflowService;
pub use state_graph::StateGraph;
