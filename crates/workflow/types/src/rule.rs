//! Transition rules: role-gated edges between workflow states
//!
//! A rule is a directed edge from one state to another within the same
//! definition. An empty allowed-role set means any caller may traverse
//! the edge; otherwise the caller needs at least one matching role,
//! compared case-insensitively.

use crate::id::{RuleId, StateId};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

// ── Role Set ─────────────────────────────────────────────────────────

/// The set of role names allowed to traverse a transition rule.
///
/// Stored data carries this field in two encodings: a JSON array of
/// strings, or a legacy comma-separated string. Both are accepted on
/// read (JSON array first, CSV fallback); writes always produce the
/// array form. Membership checks ignore ASCII case.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleSet(Vec<String>);

impl RoleSet {
    /// Empty set; the rule is unrestricted
    pub fn unrestricted() -> Self {
        Self(Vec::new())
    }

    pub fn from_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            roles
                .into_iter()
                .map(Into::into)
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        )
    }

    /// Parse the legacy comma-separated encoding
    pub fn from_csv(raw: &str) -> Self {
        Self::from_roles(raw.split(','))
    }

    pub fn is_unrestricted(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether any caller role matches, ignoring ASCII case
    pub fn intersects(&self, caller_roles: &[String]) -> bool {
        self.0.iter().any(|allowed| {
            caller_roles
                .iter()
                .any(|caller| allowed.eq_ignore_ascii_case(caller))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Encoding {
            Array(Vec<String>),
            Legacy(String),
        }

        match Encoding::deserialize(deserializer) {
            Ok(Encoding::Array(roles)) => Ok(RoleSet::from_roles(roles)),
            Ok(Encoding::Legacy(raw)) => Ok(RoleSet::from_csv(&raw)),
            Err(_) => Err(de::Error::custom(
                "allowed roles must be a JSON array or a comma-separated string",
            )),
        }
    }
}

// ── Transition Rule ──────────────────────────────────────────────────

/// A role-gated edge between two states of the same definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionRule {
    /// Unique identifier
    pub id: RuleId,
    /// Source state; must match the instance's current state
    pub from_state: StateId,
    /// Target state; must differ from the source
    pub to_state: StateId,
    /// Human-readable label, carried into the audit event
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Roles allowed to traverse this edge; empty = unrestricted
    #[serde(default)]
    pub allowed_roles: RoleSet,
    /// Whether a non-blank comment is mandatory
    pub requires_comment: bool,
    /// Inactive rules stay loadable but can never be applied
    pub is_active: bool,
    /// Ordering among rules leaving the same state
    pub sort_order: u32,
}

impl TransitionRule {
    pub fn new(from_state: StateId, to_state: StateId) -> Self {
        Self {
            id: RuleId::generate(),
            from_state,
            to_state,
            description: String::new(),
            allowed_roles: RoleSet::unrestricted(),
            requires_comment: false,
            is_active: true,
            sort_order: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_allowed_roles(mut self, roles: RoleSet) -> Self {
        self.allowed_roles = roles;
        self
    }

    pub fn with_required_comment(mut self) -> Self {
        self.requires_comment = true;
        self
    }

    pub fn with_sort_order(mut self, sort_order: u32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_roleset_from_json_array() {
        let set: RoleSet = serde_json::from_str(r#"["Admin", "Editor"]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.intersects(&["admin".to_string()]));
    }

    #[test]
    fn test_roleset_from_legacy_csv() {
        let set: RoleSet = serde_json::from_str(r#""Admin, Editor , ""#).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.intersects(&["EDITOR".to_string()]));
    }

    #[test]
    fn test_roleset_serializes_as_array() {
        let set = RoleSet::from_roles(["Admin"]);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["Admin"]"#);
    }

    #[test]
    fn test_empty_roleset_is_unrestricted() {
        let set = RoleSet::unrestricted();
        assert!(set.is_unrestricted());
        assert!(!set.intersects(&["anything".to_string()]));

        let blank: RoleSet = serde_json::from_str(r#""""#).unwrap();
        assert!(blank.is_unrestricted());
    }

    #[test]
    fn test_intersection_is_case_insensitive() {
        let set = RoleSet::from_roles(["Admin"]);
        assert!(set.intersects(&["ADMIN".to_string()]));
        assert!(set.intersects(&["admin".to_string()]));
        assert!(!set.intersects(&["editor".to_string()]));
        assert!(!set.intersects(&[]));
    }

    #[test]
    fn test_rule_builder() {
        let rule = TransitionRule::new(StateId::new("draft"), StateId::new("review"))
            .with_description("Submit for review")
            .with_allowed_roles(RoleSet::from_roles(["Editor"]))
            .with_required_comment()
            .with_sort_order(2);

        assert_eq!(rule.from_state, StateId::new("draft"));
        assert_eq!(rule.to_state, StateId::new("review"));
        assert!(rule.requires_comment);
        assert!(rule.is_active);
        assert_eq!(rule.sort_order, 2);
    }

    #[test]
    fn test_inactive_rule() {
        let rule = TransitionRule::new(StateId::new("a"), StateId::new("b")).inactive();
        assert!(!rule.is_active);
    }

    #[test]
    fn test_rule_roundtrip_accepts_own_output() {
        let rule = TransitionRule::new(StateId::new("draft"), StateId::new("review"))
            .with_allowed_roles(RoleSet::from_roles(["Admin", "Editor"]));
        let json = serde_json::to_string(&rule).unwrap();
        let back: TransitionRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back.allowed_roles, rule.allowed_roles);
        assert_eq!(back.id, rule.id);
    }

    proptest! {
        #[test]
        fn prop_roleset_csv_and_array_agree(
            roles in proptest::collection::vec("[A-Za-z][A-Za-z0-9]{0,11}", 0..6)
        ) {
            let csv = roles.join(",");
            let from_csv = RoleSet::from_csv(&csv);
            let from_array = RoleSet::from_roles(roles.clone());
            prop_assert_eq!(from_csv, from_array);
        }

        #[test]
        fn prop_roleset_survives_json_roundtrip(
            roles in proptest::collection::vec("[A-Za-z][A-Za-z0-9]{0,11}", 0..6)
        ) {
            let set = RoleSet::from_roles(roles);
            let json = serde_json::to_string(&set).unwrap();
            let back: RoleSet = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, set);
        }
    }
}
