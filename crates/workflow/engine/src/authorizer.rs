//! Role authorization for transition rules
//!
//! A rule with an empty allowed-role set is unrestricted. Otherwise
//! the caller must hold at least one of the allowed roles; the
//! comparison ignores ASCII case on both sides.

use workflow_types::TransitionRule;

/// Evaluates whether a caller's roles satisfy a rule's constraint
#[derive(Clone, Copy, Debug, Default)]
pub struct TransitionAuthorizer;

impl TransitionAuthorizer {
    pub fn new() -> Self {
        Self
    }

    /// True if the caller may traverse the rule
    pub fn authorize(&self, rule: &TransitionRule, caller_roles: &[String]) -> bool {
        rule.allowed_roles.is_unrestricted() || rule.allowed_roles.intersects(caller_roles)
    }
}
