//! In-process transport backed by bounded channels.
//!
//! [`MemoryTransport::pair`] returns the hub-side transport and a
//! [`MemoryPeer`] that plays the remote client. Dropping the peer's sender
//! ends the hub's read stream; the hub dropping its sink ends the peer's
//! receive stream.

use super::{Frame, FrameSink, FrameSource, FrameTransport};
use crate::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Hub side of an in-memory connection
pub struct MemoryTransport {
    inbound: mpsc::Receiver<Frame>,
    outbound: mpsc::Sender<Frame>,
}

/// Remote side of an in-memory connection
pub struct MemoryPeer {
    tx: mpsc::Sender<Frame>,
    rx: mpsc::Receiver<Frame>,
}

impl MemoryTransport {
    /// Connected transport/peer pair; `capacity` bounds frames in flight each way
    pub fn pair(capacity: usize) -> (MemoryTransport, MemoryPeer) {
        let (peer_tx, inbound) = mpsc::channel(capacity);
        let (outbound, peer_rx) = mpsc::channel(capacity);

        (
            MemoryTransport { inbound, outbound },
            MemoryPeer {
                tx: peer_tx,
                rx: peer_rx,
            },
        )
    }
}

impl FrameTransport for MemoryTransport {
    type Source = MemorySource;
    type Sink = MemorySink;

    fn split(self) -> (Self::Source, Self::Sink) {
        (
            MemorySource {
                inbound: self.inbound,
            },
            MemorySink {
                outbound: Some(self.outbound),
            },
        )
    }
}

pub struct MemorySource {
    inbound: mpsc::Receiver<Frame>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        self.inbound.recv().await.ok_or(TransportError::Closed)
    }
}

pub struct MemorySink {
    outbound: Option<mpsc::Sender<Frame>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::Closed)?;
        outbound
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.outbound = None;
        Ok(())
    }
}

impl MemoryPeer {
    /// Send a frame to the hub
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    /// Next frame written by the hub; `None` once the hub closed the connection
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Next frame, skipping heartbeat pings
    pub async fn recv_data(&mut self) -> Option<Frame> {
        loop {
            match self.rx.recv().await? {
                Frame::Ping(_) => continue,
                frame => return Some(frame),
            }
        }
    }

    /// Like [`recv_data`](Self::recv_data) but gives up after `timeout`
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Frame> {
        tokio::time::timeout(timeout, self.recv_data())
            .await
            .ok()
            .flatten()
    }

    /// Drop the sending half, ending the hub's read stream
    pub fn hang_up(&mut self) {
        let (closed_tx, _) = mpsc::channel(1);
        self.tx = closed_tx;
    }

    /// Close the receiving half; every later hub write fails
    pub fn stop_reading(&mut self) {
        self.rx.close();
    }
}
