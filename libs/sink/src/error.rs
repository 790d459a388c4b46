use thiserror::Error;

/// Failure modes of a record sink.
///
/// `Rejected` and `Delivery` split a failed publish by where it died:
/// before entering the client's buffer (the synchronous half of `send`)
/// or after, when the broker refused or the delivery timed out (the
/// acknowledgment future).
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    /// The client refused to queue the record, e.g. its local buffer was
    /// full or the record was malformed.
    #[error("record rejected for topic '{topic}': {reason}")]
    Rejected { topic: String, reason: String },

    /// The record was queued but the broker never positively acknowledged
    /// it. The record is gone; whether it reached the broker is unknown.
    #[error("delivery failed for topic '{topic}': {reason}")]
    Delivery { topic: String, reason: String },

    /// The sink was closed before or during the operation.
    #[error("sink closed")]
    Closed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// The sink could not be constructed from its configuration.
    #[error("invalid sink configuration: {0}")]
    InvalidConfig(String),
}

impl SinkError {
    /// Create a rejection error.
    pub fn rejected(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        SinkError::Rejected {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create a delivery error.
    pub fn delivery(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        SinkError::Delivery {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        SinkError::InvalidConfig(reason.into())
    }

    /// True for failures a later send may not hit again. `Closed` and
    /// `InvalidConfig` are permanent for the lifetime of the sink.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SinkError::Rejected { .. } | SinkError::Delivery { .. } | SinkError::Timeout(_)
        )
    }
}
