//! WebSocket transport over tokio-tungstenite.
//!
//! Works with any upgraded stream (TCP, TLS, `tokio::io::duplex`). Ping frames
//! from the peer are answered by tungstenite itself while reading, and so is
//! the close handshake.

use super::{CloseReason, Frame, FrameSink, FrameSource, FrameTransport};
use crate::{HubConfig, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

/// Server-side WebSocket handshake with the hub's read limit applied
pub async fn accept<S>(stream: S, config: &HubConfig) -> Result<WebSocketTransport<S>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);
    ws_config.max_frame_size = Some(config.max_message_size);

    let ws = tokio_tungstenite::accept_async_with_config(stream, Some(ws_config)).await?;
    Ok(WebSocketTransport::new(ws))
}

/// Frame transport wrapping an upgraded WebSocket stream
pub struct WebSocketTransport<S> {
    ws: WebSocketStream<S>,
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(ws: WebSocketStream<S>) -> Self {
        Self { ws }
    }
}

impl<S> FrameTransport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Source = WebSocketSource<S>;
    type Sink = WebSocketSink<S>;

    fn split(self) -> (Self::Source, Self::Sink) {
        let (sink, stream) = self.ws.split();
        (WebSocketSource { stream }, WebSocketSink { sink })
    }
}

/// Read half of a [`WebSocketTransport`]
pub struct WebSocketSource<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> FrameSource for WebSocketSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        loop {
            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => {
                    return Err(TransportError::Closed)
                }
                Some(Err(e)) => return Err(e.into()),
            };

            let frame = match message {
                Message::Text(text) => Frame::Text(Bytes::from(text)),
                Message::Binary(data) => Frame::Binary(Bytes::from(data)),
                Message::Ping(data) => Frame::Ping(Bytes::from(data)),
                Message::Pong(data) => Frame::Pong(Bytes::from(data)),
                Message::Close(close) => Frame::Close(close.map(|frame| {
                    CloseReason::new(u16::from(frame.code), frame.reason.into_owned())
                })),
                // Raw frames never surface while reading
                Message::Frame(_) => continue,
            };

            return Ok(frame);
        }
    }
}

/// Write half of a [`WebSocketTransport`]
pub struct WebSocketSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S> FrameSink for WebSocketSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        let is_close = matches!(frame, Frame::Close(_));
        let message = match frame {
            Frame::Text(payload) => Message::Text(String::from_utf8_lossy(&payload).into_owned()),
            Frame::Binary(payload) => Message::Binary(payload.to_vec()),
            Frame::Ping(payload) => Message::Ping(payload.to_vec()),
            Frame::Pong(payload) => Message::Pong(payload.to_vec()),
            Frame::Close(reason) => Message::Close(reason.map(|reason| CloseFrame {
                code: CloseCode::from(reason.code),
                reason: reason.reason.into(),
            })),
        };

        match self.sink.send(message).await {
            Ok(()) => Ok(()),
            // tungstenite already answered the peer's close
            Err(
                tungstenite::Error::ConnectionClosed
                | tungstenite::Error::AlreadyClosed
                | tungstenite::Error::Protocol(ProtocolError::SendAfterClosing),
            ) if is_close => {
                debug!("Close frame skipped, handshake already in progress");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.sink.close().await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
