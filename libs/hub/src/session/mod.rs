//! # Session
//!
//! ## Purpose
//! One live connection: identity, typed attributes, a bounded outbound queue
//! for direct writes, and a subscription channel fed by the pub/sub actor.
//! The transport itself is owned by the two pumps in [`pump`], never by the
//! session, so application code can only reach the connection through the
//! queues.
//!
//! ## State
//! - `open` plus both queue senders live under one lock; the transition to
//!   closed happens exactly once in [`Session::teardown`], whichever trigger
//!   (read error, write error, explicit close, hub shutdown) gets there first.
//! - Attributes live under their own lock.
//! - Neither lock is held while a queue operation runs.
//!
//! ## Backpressure
//! Direct writes never wait: a full outbound queue drops the message and
//! reports [`HubError::BufferFull`] through the error handler.

mod attributes;
pub(crate) mod pump;

use crate::hub::Shared;
use crate::pubsub::SubscriberId;
use crate::{Envelope, HubError, Result};
use attributes::Attributes;
use bytes::Bytes;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unique session identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct SessionState {
    open: bool,
    outbound: Option<mpsc::Sender<Envelope>>,
    subscription: Option<mpsc::Sender<Envelope>>,
}

/// Receiving ends handed to the pumps
pub(crate) struct SessionQueues {
    pub outbound: mpsc::Receiver<Envelope>,
    pub subscription: mpsc::Receiver<Envelope>,
    pub closed: watch::Receiver<bool>,
}

/// A live connection managed by the hub
pub struct Session {
    id: SessionId,
    peer_addr: Option<SocketAddr>,
    state: RwLock<SessionState>,
    attributes: Attributes,
    closed: watch::Sender<bool>,
    shared: Arc<Shared>,
}

impl Session {
    pub(crate) fn new(shared: Arc<Shared>, peer_addr: Option<SocketAddr>) -> (Arc<Self>, SessionQueues) {
        let (outbound_tx, outbound_rx) = mpsc::channel(shared.config.message_buffer_size);
        let (subscription_tx, subscription_rx) =
            mpsc::channel(shared.config.subscription_buffer_size);
        let (closed_tx, closed_rx) = watch::channel(false);

        let session = Arc::new(Self {
            id: SessionId::new(),
            peer_addr,
            state: RwLock::new(SessionState {
                open: true,
                outbound: Some(outbound_tx),
                subscription: Some(subscription_tx),
            }),
            attributes: Attributes::default(),
            closed: closed_tx,
            shared,
        });

        let queues = SessionQueues {
            outbound: outbound_rx,
            subscription: subscription_rx,
            closed: closed_rx,
        };

        (session, queues)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Remote address, when the transport knows it
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn is_closed(&self) -> bool {
        !self.state.read().open
    }

    /// Queue a text frame
    pub fn write(self: &Arc<Self>, payload: impl Into<Bytes>) -> Result<()> {
        self.enqueue(Envelope::text(payload))
    }

    /// Queue a binary frame
    pub fn write_binary(self: &Arc<Self>, payload: impl Into<Bytes>) -> Result<()> {
        self.enqueue(Envelope::binary(payload))
    }

    /// Queue an empty close frame; the write pump tears down after sending it
    pub fn close(self: &Arc<Self>) -> Result<()> {
        self.close_with_payload(Bytes::new())
    }

    /// Queue a close frame carrying `payload` (see [`crate::CloseReason::to_payload`])
    pub fn close_with_payload(self: &Arc<Self>, payload: impl Into<Bytes>) -> Result<()> {
        if self.is_closed() {
            return Err(HubError::SessionAlreadyClosed);
        }
        self.enqueue(Envelope::close(payload))
    }

    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.attributes.set(key, value);
    }

    /// Attribute stored under `key`, if present and of type `T`
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.attributes.get(key)
    }

    /// Attribute stored under `key`
    ///
    /// # Panics
    /// Panics when the key is absent or holds another type.
    pub fn must_get<T>(&self, key: &str) -> Arc<T>
    where
        T: Any + Send + Sync,
    {
        match self.attributes.get(key) {
            Some(value) => value,
            None => panic!(
                "session {}: attribute {:?} missing or not a {}",
                self.id,
                key,
                std::any::type_name::<T>()
            ),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains(key)
    }

    /// Remove an attribute; returns whether it existed
    pub fn remove(&self, key: &str) -> bool {
        self.attributes.remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.attributes.keys()
    }

    /// Subscribe this session to every topic
    pub async fn add_sub<I, S>(self: &Arc<Self>, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics: Vec<String> = topics.into_iter().map(Into::into).collect();
        let sender = self.state.read().subscription.clone();

        let Some(sender) = sender else {
            let error = HubError::SubscribeWithoutChannel { topics };
            self.report(&error);
            return Err(error);
        };

        let pubsub = &self.shared.pubsub;
        pubsub
            .subscribe(self.subscriber_id(), &sender, topics.clone())
            .await?;
        drop(sender);

        // Teardown's unsubscribe may have run before this registration landed
        if self.is_closed() {
            pubsub.unsubscribe_all(self.subscriber_id()).await?;
            let error = HubError::SubscribeWithoutChannel { topics };
            self.report(&error);
            return Err(error);
        }
        Ok(())
    }

    /// Unsubscribe from the listed topics; no topics means all of them
    pub async fn un_sub<I, S>(&self, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared
            .pubsub
            .unsubscribe(self.subscriber_id(), topics)
            .await
    }

    pub(crate) fn subscriber_id(&self) -> SubscriberId {
        SubscriberId::from(self.id)
    }

    /// Enqueue without waiting, reporting failures through the error handler
    pub(crate) fn enqueue(self: &Arc<Self>, envelope: Envelope) -> Result<()> {
        self.try_enqueue(envelope).inspect_err(|error| self.report(error))
    }

    /// Enqueue without waiting or reporting
    pub(crate) fn try_enqueue(&self, envelope: Envelope) -> Result<()> {
        let outbound = {
            let state = self.state.read();
            if state.open {
                state.outbound.clone()
            } else {
                None
            }
        };

        let Some(outbound) = outbound else {
            return Err(HubError::WriteToClosedSession);
        };

        outbound.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => HubError::BufferFull,
            TrySendError::Closed(_) => HubError::WriteToClosedSession,
        })
    }

    /// Route an error to the hub's error handler
    pub(crate) fn report(self: &Arc<Self>, error: &HubError) {
        match error {
            HubError::BufferFull => warn!("Session {} dropped a message: {}", self.id, error),
            _ => debug!("Session {}: {}", self.id, error),
        }
        self.shared.handlers.error(self, error);
    }

    /// Close the session exactly once; returns false if it was already closed
    ///
    /// Drops both queue senders, wakes the read pump and releases every
    /// topic membership.
    pub(crate) async fn teardown(&self) -> bool {
        let senders = {
            let mut state = self.state.write();
            if !state.open {
                return false;
            }
            state.open = false;
            (state.outbound.take(), state.subscription.take())
        };
        drop(senders);

        self.closed.send_replace(true);

        if let Err(e) = self.shared.pubsub.unsubscribe_all(self.subscriber_id()).await {
            debug!("Session {} skipped unsubscribe: {}", self.id, e);
        }

        info!("Session {} closed", self.id);
        true
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}
