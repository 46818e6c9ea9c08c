//! Error taxonomy of the audit pipeline

use thiserror::Error;

/// Failures raised by the broker, the consumer, and the record store
#[derive(Debug, Error)]
pub enum AuditError {
    /// Broker unreachable or the connection was lost
    #[error("broker connection failed: {0}")]
    Connection(String),

    /// Payload could not be decoded as a state-change event; poison,
    /// never retried
    #[error("malformed audit message: {0}")]
    MessageFormat(String),

    /// The notification handler failed; retryable up to the bound
    #[error("audit message processing failed: {0}")]
    Processing(String),

    /// Publish or acknowledgment could not be delivered to the broker
    #[error("broker delivery failed: {0}")]
    Delivery(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
