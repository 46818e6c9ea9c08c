//! Audit events: the wire format of the state-change pipeline
//!
//! One [`StateChangeEvent`] is produced per transition attempt that
//! reaches the applied step. The JSON encoding is camelCase; the read
//! path accepts property names in any casing, because existing
//! producers disagree on it. Timestamps are captured as `Utc::now()`
//! at transition time, never offset.

use crate::id::ContentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── State Change Event (wire) ────────────────────────────────────────

/// The record describing one applied transition, delivered over the
/// message broker for downstream notification and audit persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangeEvent {
    pub content_id: ContentId,
    pub content_name: String,
    pub from_state: String,
    pub to_state: String,
    pub transition_description: String,
    pub reviewed_by: String,
    /// True for forward transitions, false for the reject operation
    pub approved: bool,
    pub timestamp: DateTime<Utc>,
    pub comments: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Shadow of [`StateChangeEvent`] keyed by folded property names
/// (lowercased, underscores stripped), used by the case-insensitive
/// read path.
#[derive(Deserialize)]
struct StateChangeEventWire {
    #[serde(rename = "contentid")]
    content_id: ContentId,
    #[serde(rename = "contentname", default)]
    content_name: String,
    #[serde(rename = "fromstate")]
    from_state: String,
    #[serde(rename = "tostate")]
    to_state: String,
    #[serde(rename = "transitiondescription", default)]
    transition_description: String,
    #[serde(rename = "reviewedby", default)]
    reviewed_by: String,
    approved: bool,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    comments: Option<String>,
    #[serde(default = "default_success")]
    success: bool,
    #[serde(rename = "errormessage", default)]
    error_message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl From<StateChangeEventWire> for StateChangeEvent {
    fn from(wire: StateChangeEventWire) -> Self {
        Self {
            content_id: wire.content_id,
            content_name: wire.content_name,
            from_state: wire.from_state,
            to_state: wire.to_state,
            transition_description: wire.transition_description,
            reviewed_by: wire.reviewed_by,
            approved: wire.approved,
            timestamp: wire.timestamp,
            comments: wire.comments,
            success: wire.success,
            error_message: wire.error_message,
        }
    }
}

impl StateChangeEvent {
    /// Serialize to the camelCase wire encoding
    pub fn to_json_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize a payload, accepting property names in any casing.
    ///
    /// Top-level keys are lowercased before field matching, so
    /// `contentId`, `ContentID` and `contentid` all resolve.
    pub fn from_json_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        let normalized = match value {
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key.to_ascii_lowercase().replace('_', ""), value))
                    .collect(),
            ),
            other => other,
        };
        let wire: StateChangeEventWire = serde_json::from_value(normalized)?;
        Ok(wire.into())
    }
}

// ── Audit Record (persisted) ─────────────────────────────────────────

/// The durable, append-only form of a processed state-change event.
///
/// Records are never mutated after insert; stores only bulk-purge
/// them by age.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Generated record id; the store upserts by it
    pub id: String,
    pub content_id: ContentId,
    pub content_name: String,
    pub from_state: String,
    pub to_state: String,
    pub transition_description: String,
    pub reviewed_by: String,
    pub approved: bool,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
    pub comments: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    /// When the consumer processed the event
    pub processed_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Build the persisted record from a wire event
    pub fn from_event(event: &StateChangeEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content_id: event.content_id.clone(),
            content_name: event.content_name.clone(),
            from_state: event.from_state.clone(),
            to_state: event.to_state.clone(),
            transition_description: event.transition_description.clone(),
            reviewed_by: event.reviewed_by.clone(),
            approved: event.approved,
            timestamp: event.timestamp,
            comments: event.comments.clone(),
            success: event.success,
            error_message: event.error_message.clone(),
            processed_at: Utc::now(),
        }
    }
}
