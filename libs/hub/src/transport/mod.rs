//! # Transport Boundary
//!
//! ## Purpose
//! The hub never touches wire framing. It consumes a duplex connection that has
//! already been upgraded to frame-based messaging and splits it into a read
//! half (owned by the read pump) and a write half (owned by the write pump),
//! which is what guarantees at most one writer per connection.
//!
//! Deadlines are applied by the pumps with `tokio::time`, so transports only
//! need to move frames.
//!
//! ## Implementations
//! - [`WebSocketTransport`]: tokio-tungstenite stream (TCP, TLS, duplex)
//! - [`MemoryTransport`]: in-process channel pair for tests and embedding

use crate::TransportError;
use async_trait::async_trait;
use bytes::Bytes;

pub mod memory;
pub mod websocket;

pub use memory::{MemoryPeer, MemoryTransport};
pub use websocket::WebSocketTransport;

/// Endpoint is going away (server shutdown)
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Close frame carried no status code; never sent on the wire
pub const CLOSE_NO_STATUS: u16 = 1005;

/// One transport-level frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(Bytes),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseReason>),
}

/// Status code and reason of a close frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Encode as a close payload: big-endian code followed by UTF-8 reason
    pub fn to_payload(&self) -> Bytes {
        let mut payload = Vec::with_capacity(2 + self.reason.len());
        payload.extend_from_slice(&self.code.to_be_bytes());
        payload.extend_from_slice(self.reason.as_bytes());
        Bytes::from(payload)
    }

    /// Decode a close payload; `None` when it carries no status code
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        if payload.len() < 2 {
            return None;
        }

        let code = u16::from_be_bytes([payload[0], payload[1]]);
        let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
        Some(Self { code, reason })
    }
}

/// Read half of a frame transport
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Wait for the next inbound frame
    ///
    /// A stream that ends without a close handshake yields
    /// [`TransportError::Closed`].
    async fn read_frame(&mut self) -> Result<Frame, TransportError>;
}

/// Write half of a frame transport
#[async_trait]
pub trait FrameSink: Send + 'static {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Flush and release the connection; further writes fail
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A duplex connection already upgraded to frame-based messaging
pub trait FrameTransport: Send + 'static {
    type Source: FrameSource;
    type Sink: FrameSink;

    fn split(self) -> (Self::Source, Self::Sink);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_payload_layout() {
        let reason = CloseReason::new(CLOSE_GOING_AWAY, "restart");
        let payload = reason.to_payload();
        assert_eq!(&payload[..2], &[0x03, 0xE9]);
        assert_eq!(&payload[2..], b"restart");
        assert_eq!(CloseReason::from_payload(&payload), Some(reason));
    }

    #[test]
    fn test_short_close_payload_has_no_status() {
        assert_eq!(CloseReason::from_payload(&[]), None);
        assert_eq!(CloseReason::from_payload(&[0x03]), None);
    }
}
