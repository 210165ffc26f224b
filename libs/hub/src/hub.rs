//! # Hub
//!
//! ## Purpose
//! Aggregate owning the live-session set, the callback slots and the pub/sub
//! actor. Transport adapters hand each upgraded connection to
//! [`Hub::handle_connection`], which runs the whole session lifecycle and
//! returns once it is over.
//!
//! ## Connection Lifecycle
//! ```mermaid
//! sequenceDiagram
//!     participant T as Transport
//!     participant H as Hub
//!     participant R as Read pump
//!     participant W as Write pump
//!     T->>H: handle_connection
//!     H->>H: insert session, on_connect
//!     H->>R: spawn
//!     H->>W: spawn
//!     R-->>H: read loop ends (error, close, timeout)
//!     H->>H: teardown (drops queues, unsubscribes)
//!     W-->>H: queues drained, transport closed
//!     H->>H: remove session, on_disconnect
//! ```
//!
//! A session counts towards [`Hub::len`] exactly between its connect and
//! disconnect callbacks.
//!
//! ## Shutdown
//! [`Hub::close`] queues a going-away close frame on every session, stops the
//! pub/sub actor and then waits until the live-session set is empty. Write
//! pumps also watch the actor, so stopping it through [`Hub::pubsub`] alone
//! still ends every session.

use crate::handlers::Handlers;
use crate::session::{pump, Session, SessionId};
use crate::transport::{websocket, CloseReason, FrameTransport, CLOSE_GOING_AWAY};
use crate::{Envelope, HubConfig, HubError, PubSub, Result, TopicStats};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// State every session of a hub refers back to
pub(crate) struct Shared {
    pub config: HubConfig,
    pub handlers: Handlers,
    pub pubsub: PubSub,
}

impl Shared {
    pub fn new(config: HubConfig, pubsub: PubSub) -> Self {
        Self {
            config,
            handlers: Handlers::default(),
            pubsub,
        }
    }
}

struct HubInner {
    shared: Arc<Shared>,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    actor: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    /// Signalled whenever a session leaves `sessions`
    departed: Notify,
}

/// Connection hub; clones share the same sessions and topics
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    /// Validate `config` and start the pub/sub actor on the current runtime
    pub fn new(config: HubConfig) -> Result<Self> {
        config.validate()?;
        tokio::runtime::Handle::try_current()
            .map_err(|e| HubError::Config(format!("Hub requires a tokio runtime: {}", e)))?;

        let (pubsub, actor) = PubSub::spawn(config.command_buffer_size);
        info!(
            "✅ Hub started (ping every {:?}, pong wait {:?})",
            config.ping_period(),
            config.pong_wait()
        );

        Ok(Self {
            inner: Arc::new(HubInner {
                shared: Arc::new(Shared::new(config, pubsub)),
                sessions: RwLock::new(HashMap::new()),
                actor: Mutex::new(Some(actor)),
                closed: AtomicBool::new(false),
                departed: Notify::new(),
            }),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.shared.config
    }

    pub fn pubsub(&self) -> &PubSub {
        &self.inner.shared.pubsub
    }

    pub fn on_connect<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.shared.handlers.set_connect(handler);
    }

    pub fn on_disconnect<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.shared.handlers.set_disconnect(handler);
    }

    /// Text message handler, awaited on the session's read pump
    pub fn on_message<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<Session>, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.shared.handlers.set_message(handler);
    }

    /// Binary message handler, awaited on the session's read pump
    pub fn on_message_binary<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<Session>, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.shared.handlers.set_message_binary(handler);
    }

    pub fn on_message_sent<F>(&self, handler: F)
    where
        F: Fn(&Arc<Session>, &Bytes) + Send + Sync + 'static,
    {
        self.inner.shared.handlers.set_message_sent(handler);
    }

    pub fn on_message_sent_binary<F>(&self, handler: F)
    where
        F: Fn(&Arc<Session>, &Bytes) + Send + Sync + 'static,
    {
        self.inner.shared.handlers.set_message_sent_binary(handler);
    }

    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&Arc<Session>, &HubError) + Send + Sync + 'static,
    {
        self.inner.shared.handlers.set_error(handler);
    }

    pub fn on_pong<F>(&self, handler: F)
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        self.inner.shared.handlers.set_pong(handler);
    }

    /// Close frame handler; an `Err` suppresses the close echo and becomes
    /// the error reported for the read loop
    pub fn on_close<F>(&self, handler: F)
    where
        F: Fn(&Arc<Session>, u16, &str) -> Result<()> + Send + Sync + 'static,
    {
        self.inner.shared.handlers.set_close(handler);
    }

    /// WebSocket handshake on `stream`, then [`handle_connection`](Self::handle_connection)
    pub async fn accept<S>(&self, stream: S, peer_addr: Option<SocketAddr>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        if self.is_closed() {
            return Err(HubError::HubClosed);
        }

        let transport = websocket::accept(stream, self.config()).await?;
        self.handle_connection(transport, peer_addr).await
    }

    /// Run one session over `transport` until both pumps have stopped
    pub async fn handle_connection<T>(&self, transport: T, peer_addr: Option<SocketAddr>) -> Result<()>
    where
        T: FrameTransport,
    {
        if self.is_closed() {
            return Err(HubError::HubClosed);
        }

        let shared = &self.inner.shared;
        let (session, queues) = Session::new(shared.clone(), peer_addr);
        let id = session.id();

        self.inner.sessions.write().insert(id, session.clone());
        info!("🔌 Session {} connected ({:?})", id, peer_addr);

        // Hub closed while registering; let the pumps wind down at once
        if self.is_closed() {
            session.teardown().await;
        }

        shared.handlers.connect(&session).await;

        let (source, sink) = transport.split();
        let writer = tokio::spawn(pump::write_pump(
            session.clone(),
            sink,
            queues.outbound,
            queues.subscription,
        ));
        let reader = tokio::spawn(pump::read_pump(session.clone(), source, queues.closed));

        if let Err(e) = reader.await {
            warn!("Session {} read pump failed: {}", id, e);
        }
        session.teardown().await;
        if let Err(e) = writer.await {
            warn!("Session {} write pump failed: {}", id, e);
        }

        self.inner.sessions.write().remove(&id);
        self.inner.departed.notify_waiters();
        shared.handlers.disconnect(&session).await;
        info!("👋 Session {} disconnected", id);

        Ok(())
    }

    /// Text frame to every live session
    pub fn broadcast(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.broadcast_envelope(Envelope::text(payload))
    }

    /// Text frame to every live session accepted by `filter`
    pub fn broadcast_filter<F>(&self, payload: impl Into<Bytes>, filter: F) -> Result<()>
    where
        F: Fn(&Session) -> bool + Send + Sync + 'static,
    {
        self.broadcast_envelope(Envelope::text(payload).with_filter(filter))
    }

    /// Text frame to every live session except `session`
    pub fn broadcast_others(&self, payload: impl Into<Bytes>, session: &Session) -> Result<()> {
        let id = session.id();
        self.broadcast_filter(payload, move |s| s.id() != id)
    }

    pub fn broadcast_binary(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.broadcast_envelope(Envelope::binary(payload))
    }

    pub fn broadcast_binary_filter<F>(&self, payload: impl Into<Bytes>, filter: F) -> Result<()>
    where
        F: Fn(&Session) -> bool + Send + Sync + 'static,
    {
        self.broadcast_envelope(Envelope::binary(payload).with_filter(filter))
    }

    pub fn broadcast_binary_others(&self, payload: impl Into<Bytes>, session: &Session) -> Result<()> {
        let id = session.id();
        self.broadcast_binary_filter(payload, move |s| s.id() != id)
    }

    /// Enqueue `envelope` on every matching session without waiting
    ///
    /// Sessions with a full queue miss the message and report `BufferFull`.
    pub fn broadcast_envelope(&self, envelope: Envelope) -> Result<()> {
        if self.is_closed() {
            return Err(HubError::HubClosed);
        }

        for session in self.sessions() {
            if envelope.matches(&session) {
                // Failures already went to the error handler
                let _ = session.enqueue(envelope.clone());
            }
        }
        Ok(())
    }

    /// Publish a text message to topics
    pub async fn pub_msg<I, S>(&self, payload: impl Into<Bytes>, is_async: bool, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pub_text_msg(payload, is_async, topics).await
    }

    pub async fn pub_text_msg<I, S>(&self, payload: impl Into<Bytes>, is_async: bool, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.publish(Envelope::text(payload), is_async, topics).await
    }

    pub async fn pub_binary_msg<I, S>(&self, payload: impl Into<Bytes>, is_async: bool, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.publish(Envelope::binary(payload), is_async, topics).await
    }

    /// Synchronous publishes wait for every subscriber's buffer; async ones
    /// skip full subscribers
    pub async fn publish<I, S>(&self, envelope: Envelope, is_async: bool, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pubsub = &self.inner.shared.pubsub;
        if is_async {
            pubsub.publish_async(envelope, topics).await
        } else {
            pubsub.publish(envelope, topics).await
        }
    }

    /// Force every subscriber off the listed topics
    pub async fn close_topic<I, S>(&self, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.shared.pubsub.close_topic(topics).await
    }

    pub async fn topic_stats(&self) -> Result<TopicStats> {
        self.inner.shared.pubsub.stats().await
    }

    /// Live session count
    pub fn len(&self) -> usize {
        self.inner.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Snapshot of the live sessions
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.inner.sessions.read().values().cloned().collect()
    }

    /// Stop accepting work, close every session with "going away" and
    /// release every topic
    ///
    /// Returns once the actor has stopped and every session has finished its
    /// teardown. Awaiting this from inside a session handler never returns,
    /// since that session cannot finish while its handler is running.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Err(HubError::HubClosed);
        }

        info!("🛑 Closing hub ({} sessions)", self.len());

        // Queued ahead of the actor shutdown so write pumps send it before
        // they react to the actor going away
        let going_away = CloseReason::new(CLOSE_GOING_AWAY, "").to_payload();
        for session in self.sessions() {
            if session.try_enqueue(Envelope::close(going_away.clone())).is_err() {
                session.teardown().await;
            }
        }

        if let Err(e) = self.inner.shared.pubsub.shutdown().await {
            debug!("Pub/sub actor already stopped: {}", e);
        }

        let actor = self.inner.actor.lock().take();
        if let Some(actor) = actor {
            if let Err(e) = actor.await {
                warn!("Pub/sub actor ended abnormally: {}", e);
            }
        }

        self.sessions_drained().await;
        info!("✅ Hub closed");
        Ok(())
    }

    async fn sessions_drained(&self) {
        loop {
            let departed = self.inner.departed.notified();
            tokio::pin!(departed);
            // Register before checking so a departure in between is not lost
            departed.as_mut().enable();

            if self.is_empty() {
                return;
            }
            departed.await;
        }
    }
}
