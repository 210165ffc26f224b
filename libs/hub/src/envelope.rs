//! Outbound unit of work consumed by a session's write pump.

use crate::session::Session;
use crate::transport::{CloseReason, Frame};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Predicate selecting which sessions a broadcast reaches
pub type SessionFilter = Arc<dyn Fn(&Session) -> bool + Send + Sync>;

/// Frame kind carried by an [`Envelope`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Text,
    Binary,
    Ping,
    Close,
}

/// Immutable outbound message: frame kind, payload and optional session filter
#[derive(Clone)]
pub struct Envelope {
    kind: FrameKind,
    payload: Bytes,
    filter: Option<SessionFilter>,
}

impl Envelope {
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            filter: None,
        }
    }

    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Text, payload)
    }

    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Binary, payload)
    }

    pub fn ping() -> Self {
        Self::new(FrameKind::Ping, Bytes::new())
    }

    /// Close envelope; `payload` is an encoded close reason or empty
    pub fn close(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Close, payload)
    }

    /// Restrict delivery to sessions accepted by `filter`
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Session) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whether this envelope should be delivered to `session`
    pub fn matches(&self, session: &Session) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(session))
    }

    pub(crate) fn to_frame(&self) -> Frame {
        match self.kind {
            FrameKind::Text => Frame::Text(self.payload.clone()),
            FrameKind::Binary => Frame::Binary(self.payload.clone()),
            FrameKind::Ping => Frame::Ping(self.payload.clone()),
            FrameKind::Close => Frame::Close(CloseReason::from_payload(&self.payload)),
        }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("kind", &self.kind)
            .field("payload_len", &self.payload.len())
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_frames() {
        let envelope = Envelope::text("hello");
        assert_eq!(envelope.kind(), FrameKind::Text);
        assert_eq!(envelope.to_frame(), Frame::Text(Bytes::from_static(b"hello")));

        let envelope = Envelope::binary(vec![1u8, 2, 3]);
        assert_eq!(envelope.to_frame(), Frame::Binary(Bytes::from(vec![1u8, 2, 3])));

        assert_eq!(Envelope::ping().to_frame(), Frame::Ping(Bytes::new()));
    }

    #[test]
    fn test_close_envelope_carries_reason() {
        let reason = CloseReason::new(4000, "kicked");
        let envelope = Envelope::close(reason.to_payload());
        assert_eq!(envelope.to_frame(), Frame::Close(Some(reason)));

        assert_eq!(Envelope::close(Bytes::new()).to_frame(), Frame::Close(None));
    }

    #[test]
    fn test_debug_hides_filter() {
        let envelope = Envelope::text("x").with_filter(|_| false);
        let debug = format!("{:?}", envelope);
        assert!(debug.contains("filtered: true"));
    }
}
