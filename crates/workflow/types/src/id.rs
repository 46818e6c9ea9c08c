//! Identifiers for workflow entities
//!
//! Every identifier is a string newtype. Generated ids are UUIDv4;
//! callers that migrate existing data can construct ids from any
//! non-empty string.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// First eight characters, for compact log output
            pub fn short(&self) -> String {
                self.0.chars().take(8).collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a workflow definition
    DefinitionId
);

string_id!(
    /// Unique identifier for a workflow state
    StateId
);

string_id!(
    /// Unique identifier for a transition rule
    RuleId
);

string_id!(
    /// Unique identifier for a workflow instance
    InstanceId
);

string_id!(
    /// Identifier of the content item governed by a workflow instance
    ContentId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = InstanceId::generate();
        let b = InstanceId::generate();
        assert_ne!(a, b);
        assert!(!a.0.is_empty());
    }

    #[test]
    fn test_short_form() {
        let id = DefinitionId::generate();
        assert!(id.short().chars().count() <= 8);

        let tiny = StateId::new("abc");
        assert_eq!(tiny.short(), "abc");
    }

    #[test]
    fn test_short_form_respects_char_boundaries() {
        // The eighth byte of this id sits inside a multibyte character
        let id = StateId::new("aaaaaaaé");
        assert_eq!(id.short(), "aaaaaaaé");

        let accents = ContentId::new("ééééééééé");
        assert_eq!(accents.short(), "éééééééé");
    }

    #[test]
    fn test_display_and_named() {
        let named = RuleId::new("draft-to-review");
        assert_eq!(format!("{}", named), "draft-to-review");
    }

    #[test]
    fn test_serde_is_transparent_string() {
        let id = ContentId::new("content-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"content-42\"");
        let back: ContentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
