//! Asynchronous audit trail for workflow state changes
//!
//! The engine emits one [`StateChangeEvent`](workflow_types::StateChangeEvent)
//! per applied transition. This crate carries the event across the
//! broker boundary and into durable audit records:
//!
//! - [`BrokerConnection`]: lazily-connected process-wide handle to
//!   the NATS JetStream broker, idempotent topology declaration
//! - [`AuditEventPublisher`]: fire-and-forget producer implementing
//!   the engine's `AuditSink` port
//! - [`AuditMessageConsumer`]: sequential consumer with bounded
//!   retry, explicit acknowledgment, and poison-message termination
//! - [`NotificationRecordStore`] / [`StoreNotificationHandler`]:
//!   idempotent persistence of processed events as audit records
//! - [`OutboxRelay`]: background re-drain of outbox entries a crash
//!   left pending
//!
//! Delivery is at-least-once end to end; the record store upserts by
//! record id so redelivery is harmless.

#![deny(unsafe_code)]

pub mod broker;
pub mod config;
pub mod consumer;
pub mod error;
pub mod publisher;
pub mod record_store;
pub mod relay;

pub use broker::BrokerConnection;
pub use config::{AuditConsumerConfig, BrokerConfig, RelayConfig};
pub use consumer::{AuditMessageConsumer, Disposition, NotificationHandler};
pub use error::{AuditError, AuditResult};
pub use publisher::AuditEventPublisher;
pub use record_store::{InMemoryRecordStore, NotificationRecordStore, StoreNotificationHandler};
pub use relay::OutboxRelay;
