//! Workflow definitions: editor-defined approval graphs
//!
//! A definition owns an ordered list of states and the transition
//! rules connecting them. Exactly one state is the initial state;
//! states flagged `is_published` or `is_final` trigger content publish
//! side effects when entered. Definitions are structurally immutable
//! once instances reference them (metadata edits remain allowed);
//! enforcement lives in the service layer, validation lives here.

use crate::error::{WorkflowError, WorkflowResult};
use crate::id::{DefinitionId, RuleId, StateId};
use crate::rule::TransitionRule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Workflow State ───────────────────────────────────────────────────

/// A named stage of an approval workflow (Draft, Review, Published...)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Unique identifier
    pub id: StateId,
    /// Short symbolic key, unique within the definition
    pub state_key: String,
    /// Human-readable name
    pub name: String,
    /// Instances are created in the definition's initial state
    pub is_initial: bool,
    /// Entering this state publishes the content item
    pub is_published: bool,
    /// Entering this state completes the instance
    pub is_final: bool,
    /// Display and evaluation order
    pub sort_order: u32,
}

impl WorkflowState {
    pub fn new(state_key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: StateId::generate(),
            state_key: state_key.into(),
            name: name.into(),
            is_initial: false,
            is_published: false,
            is_final: false,
            sort_order: 0,
        }
    }

    pub fn initial(mut self) -> Self {
        self.is_initial = true;
        self
    }

    pub fn published(mut self) -> Self {
        self.is_published = true;
        self
    }

    pub fn terminal(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn with_sort_order(mut self, sort_order: u32) -> Self {
        self.sort_order = sort_order;
        self
    }
}

// ── Workflow Definition ──────────────────────────────────────────────

/// A named, versioned graph of states and transition rules
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique identifier
    pub id: DefinitionId,
    /// Unique name across definitions
    pub name: String,
    /// Description shown to editors
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Version for tracking definition evolution
    pub version: u32,
    /// Inactive definitions cannot spawn new instances
    pub is_active: bool,
    /// The states of the graph, in sort order
    pub states: Vec<WorkflowState>,
    /// The role-gated edges of the graph
    pub rules: Vec<TransitionRule>,
    /// When this definition was created
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DefinitionId::generate(),
            name: name.into(),
            description: String::new(),
            version: 1,
            is_active: true,
            states: Vec::new(),
            rules: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a state to the graph.
    ///
    /// Rejects duplicate state keys and a second initial state.
    pub fn add_state(&mut self, state: WorkflowState) -> WorkflowResult<()> {
        if self.states.iter().any(|s| s.state_key == state.state_key) {
            return Err(WorkflowError::Validation(format!(
                "duplicate state key '{}'",
                state.state_key
            )));
        }
        if state.is_initial && self.states.iter().any(|s| s.is_initial) {
            return Err(WorkflowError::Validation(
                "definition already has an initial state".into(),
            ));
        }
        self.states.push(state);
        self.states.sort_by_key(|s| s.sort_order);
        Ok(())
    }

    /// Add a transition rule to the graph.
    ///
    /// Both endpoints must exist, a rule may not loop onto its source,
    /// and the (from, to) pair must be unique.
    pub fn add_rule(&mut self, rule: TransitionRule) -> WorkflowResult<()> {
        if rule.from_state == rule.to_state {
            return Err(WorkflowError::Validation(
                "transition rule may not loop onto its source state".into(),
            ));
        }
        if self.state(&rule.from_state).is_none() {
            return Err(WorkflowError::StateNotFound(rule.from_state));
        }
        if self.state(&rule.to_state).is_none() {
            return Err(WorkflowError::StateNotFound(rule.to_state));
        }
        if self
            .rules
            .iter()
            .any(|r| r.from_state == rule.from_state && r.to_state == rule.to_state)
        {
            return Err(WorkflowError::Validation(format!(
                "duplicate transition rule '{}' -> '{}'",
                rule.from_state, rule.to_state
            )));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Get a state by id
    pub fn state(&self, id: &StateId) -> Option<&WorkflowState> {
        self.states.iter().find(|s| &s.id == id)
    }

    /// Get a state by its symbolic key
    pub fn state_by_key(&self, key: &str) -> Option<&WorkflowState> {
        self.states.iter().find(|s| s.state_key == key)
    }

    /// Get a rule by id
    pub fn rule(&self, id: &RuleId) -> Option<&TransitionRule> {
        self.rules.iter().find(|r| &r.id == id)
    }

    /// The single initial state, if the definition is well-formed
    pub fn initial_state(&self) -> Option<&WorkflowState> {
        self.states.iter().find(|s| s.is_initial)
    }

    /// Validate structural invariants: at least one state, exactly one
    /// initial state, unique state keys, rule endpoints present.
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.states.is_empty() {
            return Err(WorkflowError::Validation(
                "definition must have at least one state".into(),
            ));
        }

        let initial_count = self.states.iter().filter(|s| s.is_initial).count();
        if initial_count != 1 {
            return Err(WorkflowError::Validation(format!(
                "definition must have exactly one initial state, found {}",
                initial_count
            )));
        }

        let mut seen = HashSet::new();
        for state in &self.states {
            if !seen.insert(state.state_key.as_str()) {
                return Err(WorkflowError::Validation(format!(
                    "duplicate state key '{}'",
                    state.state_key
                )));
            }
        }

        for rule in &self.rules {
            if self.state(&rule.from_state).is_none() {
                return Err(WorkflowError::StateNotFound(rule.from_state.clone()));
            }
            if self.state(&rule.to_state).is_none() {
                return Err(WorkflowError::StateNotFound(rule.to_state.clone()));
            }
            if rule.from_state == rule.to_state {
                return Err(WorkflowError::Validation(
                    "transition rule may not loop onto its source state".into(),
                ));
            }
        }

        Ok(())
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
