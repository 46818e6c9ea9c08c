//! State graph: an arena-indexed view of one workflow definition
//!
//! States and transition rules reference each other cyclically in the
//! definition (rules point at states, states are endpoints of rules).
//! Rather than objects holding mutual back-references, the graph keeps
//! an arena of state records plus adjacency lists of rule indices, so
//! lookups are O(1) and nothing owns anything twice.

use std::collections::HashMap;
use workflow_types::{
    RuleId, StateId, TransitionRule, WorkflowDefinition, WorkflowError, WorkflowResult,
    WorkflowState,
};

/// In-memory index of a definition's states and transition rules
#[derive(Clone, Debug)]
pub struct StateGraph {
    states: Vec<WorkflowState>,
    rules: Vec<TransitionRule>,
    state_index: HashMap<StateId, usize>,
    key_index: HashMap<String, usize>,
    rule_index: HashMap<RuleId, usize>,
    /// Per state: indices of *active* outgoing rules, sorted by rule
    /// sort order
    outgoing: Vec<Vec<usize>>,
    initial: usize,
}

impl StateGraph {
    /// Build the graph from a definition.
    ///
    /// Fails with a validation error unless the definition is
    /// structurally sound, including exactly one initial state.
    pub fn build(definition: &WorkflowDefinition) -> WorkflowResult<Self> {
        definition.validate()?;

        let states = definition.states.clone();
        let rules = definition.rules.clone();

        let mut state_index = HashMap::with_capacity(states.len());
        let mut key_index = HashMap::with_capacity(states.len());
        for (idx, state) in states.iter().enumerate() {
            state_index.insert(state.id.clone(), idx);
            key_index.insert(state.state_key.clone(), idx);
        }

        let mut rule_index = HashMap::with_capacity(rules.len());
        let mut outgoing = vec![Vec::new(); states.len()];
        for (idx, rule) in rules.iter().enumerate() {
            rule_index.insert(rule.id.clone(), idx);
            if rule.is_active {
                let source = state_index
                    .get(&rule.from_state)
                    .copied()
                    .ok_or_else(|| WorkflowError::StateNotFound(rule.from_state.clone()))?;
                outgoing[source].push(idx);
            }
        }
        for adjacency in &mut outgoing {
            adjacency.sort_by_key(|&idx| rules[idx].sort_order);
        }

        // validate() guarantees exactly one initial state
        let initial = states
            .iter()
            .position(|s| s.is_initial)
            .ok_or_else(|| WorkflowError::Validation("missing initial state".into()))?;

        Ok(Self {
            states,
            rules,
            state_index,
            key_index,
            rule_index,
            outgoing,
            initial,
        })
    }

    /// Get a state by id
    pub fn state(&self, id: &StateId) -> Option<&WorkflowState> {
        self.state_index.get(id).map(|&idx| &self.states[idx])
    }

    /// Get a state by symbolic key
    pub fn state_by_key(&self, key: &str) -> Option<&WorkflowState> {
        self.key_index.get(key).map(|&idx| &self.states[idx])
    }

    /// The definition's initial state
    pub fn initial_state(&self) -> &WorkflowState {
        &self.states[self.initial]
    }

    /// Get a rule by id, active or not
    pub fn rule(&self, id: &RuleId) -> Option<&TransitionRule> {
        self.rule_index.get(id).map(|&idx| &self.rules[idx])
    }

    /// Active rules leaving a state, sorted by sort order
    pub fn outgoing_rules(&self, state: &StateId) -> Vec<&TransitionRule> {
        match self.state_index.get(state) {
            Some(&idx) => self.outgoing[idx]
                .iter()
                .map(|&rule_idx| &self.rules[rule_idx])
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
