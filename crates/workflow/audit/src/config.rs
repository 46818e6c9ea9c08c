//! Configuration for the broker, the consumer, and the outbox relay
//!
//! Plain structs with serde defaults; every field can be overridden
//! individually when deserializing from an application config file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Broker ───────────────────────────────────────────────────────────

/// Connection and topology settings for the audit broker
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// NATS server URL
    pub url: String,
    /// Durable stream holding audit events
    pub stream_name: String,
    /// Subject audit events are published to
    pub subject: String,
    /// Stream retention cap in messages
    pub max_messages: i64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".into(),
            stream_name: "workflow_audit".into(),
            subject: "workflow.audit.state-changed".into(),
            max_messages: 1_000_000,
        }
    }
}

// ── Consumer ─────────────────────────────────────────────────────────

/// Settings for the audit message consumer
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConsumerConfig {
    /// Durable consumer name; survives restarts
    pub durable_name: String,
    /// Handler invocations per message before the message is rejected
    pub max_retry_attempts: u32,
    /// Fixed delay between handler retries
    #[serde(with = "duration_millis")]
    pub retry_delay: Duration,
}

impl Default for AuditConsumerConfig {
    fn default() -> Self {
        Self {
            durable_name: "audit-consumer".into(),
            max_retry_attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

// ── Relay ────────────────────────────────────────────────────────────

/// Settings for the outbox relay worker
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// How often the relay scans for pending entries
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
    /// Total attempts per entry before it is marked failed
    pub max_attempts: u32,
    /// Entries drained per scan
    pub batch_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_attempts: 5,
            batch_size: 32,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
