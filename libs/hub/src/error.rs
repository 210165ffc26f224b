//! # Hub Error Types
//!
//! Session-level failures raised inside the pumps have no caller to return to,
//! so they are funneled through the hub's error handler. Synchronous misuse of
//! the public API is returned to the caller directly.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failures of the underlying frame transport
///
/// Every variant is fatal to the session that observed it.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection is gone (local teardown or stream ended)
    #[error("Transport closed")]
    Closed,

    /// The peer sent a close frame
    #[error("Connection closed by peer: code {code} ({reason})")]
    ClosedByPeer { code: u16, reason: String },

    /// No pong arrived before the read deadline
    #[error("Read deadline exceeded")]
    ReadTimeout,

    /// A frame could not be written before the write deadline
    #[error("Write deadline exceeded")]
    WriteTimeout,

    /// Inbound frame exceeds the configured read limit
    #[error("Message too large: {size} bytes (limit {limit})")]
    MessageTooLarge { size: usize, limit: usize },

    /// WebSocket protocol or I/O failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

/// Hub, session and pub/sub errors
#[derive(Error, Debug)]
pub enum HubError {
    /// Write attempted after the session was closed
    #[error("Tried to write to a closed session")]
    WriteToClosedSession,

    /// Outbound queue is at capacity; the message was dropped
    #[error("Session message buffer is full")]
    BufferFull,

    /// Transport failure that tore the session down
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Topic operation on a session without a subscription channel
    #[error("Session has no subscription channel (topics: {})", .topics.join(","))]
    SubscribeWithoutChannel { topics: Vec<String> },

    /// `close` called on a session that is already closed
    #[error("Session is already closed")]
    SessionAlreadyClosed,

    /// Command sent after the pub/sub actor terminated
    #[error("Pub/sub actor has shut down")]
    PubSubClosed,

    /// Connection or broadcast attempted after hub shutdown
    #[error("Hub is closed")]
    HubClosed,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error returned by an application close handler
    #[error("Handler error: {0}")]
    Handler(String),
}

impl HubError {
    /// True for failures that end the session
    pub fn is_fatal(&self) -> bool {
        matches!(self, HubError::Transport(_))
    }
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = HubError::SubscribeWithoutChannel {
            topics: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Session has no subscription channel (topics: a,b)"
        );

        let err: HubError = TransportError::ClosedByPeer {
            code: 1000,
            reason: "bye".to_string(),
        }
        .into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("code 1000"));

        assert!(!HubError::BufferFull.is_fatal());
    }
}
