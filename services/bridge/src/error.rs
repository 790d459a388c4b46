//! Error types for the bridge service

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The stream endpoint did not answer within the connection budget
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// The stream endpoint rejected the signed request outright
    #[error("Authentication rejected by stream endpoint (HTTP {status})")]
    AuthenticationRejected {
        /// HTTP status returned by the endpoint
        status: u16,
    },

    /// The stream endpoint refused the subscription for another reason,
    /// e.g. rate limiting
    #[error("Stream subscription refused (HTTP {status})")]
    StreamRejected {
        /// HTTP status returned by the endpoint
        status: u16,
    },

    /// No bytes arrived within the read window; the connection is presumed
    /// dead even though the socket is still open
    #[error("Stream stalled: no data for {timeout_ms}ms")]
    ReadStalled {
        /// Stall window in milliseconds
        timeout_ms: u64,
    },

    /// The server closed the response body
    #[error("Stream ended by remote")]
    StreamEnded,

    /// Consecutive reconnect attempts all failed
    #[error("Gave up reconnecting after {max_attempts} attempts")]
    ReconnectAttemptsExhausted {
        /// Attempts that were tried
        max_attempts: u32,
    },

    /// Relay buffer failure; the consuming side is gone
    #[error("Relay buffer error: {0}")]
    Buffer(#[from] relay_buffer::BufferError),

    /// Transport-level HTTP error from the stream connection
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured stream endpoint is not a valid URL
    #[error("Invalid stream endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

impl BridgeError {
    /// Check if this error is worth a reconnect attempt
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BridgeError::ConnectionTimeout { .. }
                | BridgeError::StreamRejected { .. }
                | BridgeError::ReadStalled { .. }
                | BridgeError::StreamEnded
                | BridgeError::Http(_)
        )
    }

    /// Check if this error indicates a permanent failure that retrying
    /// cannot fix
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            BridgeError::AuthenticationRejected { .. }
                | BridgeError::ReconnectAttemptsExhausted { .. }
                | BridgeError::Buffer(_)
                | BridgeError::InvalidEndpoint(_)
        )
    }
}
