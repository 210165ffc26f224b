//! Common Test Utilities for the Hub
//!
//! In-memory connections plus channels that capture what the hub's
//! callbacks observed.

#![allow(dead_code)]

use bytes::Bytes;
use relay_hub::{Frame, Hub, HubConfig, MemoryPeer, MemoryTransport, Result, Session};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Long enough for any in-memory hop, short enough to keep negative checks fast
pub const WAIT: Duration = Duration::from_millis(500);
pub const QUIET: Duration = Duration::from_millis(100);

/// Timing that never fires during a short test
pub fn test_config() -> HubConfig {
    HubConfig {
        write_wait_ms: 1_000,
        pong_wait_ms: 60_000,
        ping_period_ms: 54_000,
        ..HubConfig::default()
    }
}

/// One in-memory client and the task running its session
pub struct Client {
    pub peer: MemoryPeer,
    pub session: Arc<Session>,
    pub task: JoinHandle<Result<()>>,
}

/// Hub whose connect callback hands each new session to the test
pub struct TestHub {
    pub hub: Hub,
    connected: mpsc::UnboundedReceiver<Arc<Session>>,
}

impl TestHub {
    pub fn new(config: HubConfig) -> Self {
        let hub = Hub::new(config).expect("valid test config");
        let (tx, connected) = mpsc::unbounded_channel();
        hub.on_connect(move |session| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(session);
            }
        });
        Self { hub, connected }
    }

    pub async fn connect(&mut self) -> Client {
        let (transport, peer) = MemoryTransport::pair(64);
        let hub = self.hub.clone();
        let task = tokio::spawn(async move { hub.handle_connection(transport, None).await });

        let session = tokio::time::timeout(WAIT, self.connected.recv())
            .await
            .expect("session connected in time")
            .expect("connect channel open");

        Client {
            peer,
            session,
            task,
        }
    }
}

/// Errors reported through the hub's error handler, as display strings
pub fn capture_errors(hub: &Hub) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    hub.on_error(move |_, error| {
        let _ = tx.send(error.to_string());
    });
    rx
}

pub fn text(payload: &'static str) -> Frame {
    Frame::Text(Bytes::from_static(payload.as_bytes()))
}

pub async fn finished(task: JoinHandle<Result<()>>) {
    tokio::time::timeout(WAIT, task)
        .await
        .expect("session finished in time")
        .expect("session task panicked")
        .expect("handle_connection failed");
}
