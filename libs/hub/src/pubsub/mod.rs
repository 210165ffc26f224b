//! # PubSub Actor
//!
//! ## Purpose
//! Serializes every topic membership change and every publish through one
//! command loop that exclusively owns the [`Registry`](registry). Callers hold
//! a cloneable [`PubSub`] handle and never touch registry state directly, so
//! the registry needs no locks.
//!
//! ## Lifecycle
//! ```mermaid
//! stateDiagram-v2
//!     [*] --> Running: spawn
//!     Running --> Running: Subscribe / Publish / Unsubscribe / ...
//!     Running --> Draining: Shutdown (command queue closed)
//!     Draining --> Terminated: every subscriber channel released
//!     Terminated --> [*]
//! ```
//!
//! ## Delivery Semantics
//! - `Publish` awaits buffer space in every subscriber channel, so a slow
//!   subscriber stalls the actor (and therefore its publisher) until its
//!   write pump catches up. Per-topic order is preserved.
//! - `AsyncPublish` never waits; a full subscriber misses that message.
//! - Once the handle reports [`HubError::PubSubClosed`] no command will ever
//!   be processed again.

mod registry;

pub use registry::TopicStats;

use crate::session::SessionId;
use crate::{Envelope, HubError, Result};
use registry::Registry;
use std::fmt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Registry key of one subscriber channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<SessionId> for SubscriberId {
    fn from(id: SessionId) -> Self {
        Self(id.as_uuid())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Commands processed by the actor loop
pub(crate) enum Command {
    Subscribe {
        subscriber: SubscriberId,
        sender: mpsc::Sender<Envelope>,
        topics: Vec<String>,
    },
    Publish {
        envelope: Envelope,
        topics: Vec<String>,
    },
    AsyncPublish {
        envelope: Envelope,
        topics: Vec<String>,
    },
    Unsubscribe {
        subscriber: SubscriberId,
        topics: Vec<String>,
    },
    UnsubscribeAll {
        subscriber: SubscriberId,
    },
    CloseTopic {
        topics: Vec<String>,
    },
    Stats {
        reply: oneshot::Sender<TopicStats>,
    },
    Shutdown,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Subscribe { .. } => "subscribe",
            Command::Publish { .. } => "publish",
            Command::AsyncPublish { .. } => "async_publish",
            Command::Unsubscribe { .. } => "unsubscribe",
            Command::UnsubscribeAll { .. } => "unsubscribe_all",
            Command::CloseTopic { .. } => "close_topic",
            Command::Stats { .. } => "stats",
            Command::Shutdown => "shutdown",
        }
    }
}

/// Handle to the pub/sub actor
#[derive(Clone)]
pub struct PubSub {
    commands: mpsc::Sender<Command>,
}

impl PubSub {
    /// Start the actor on the current runtime with a bounded command queue
    pub fn spawn(command_capacity: usize) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::channel(command_capacity);
        let actor = Actor {
            registry: Registry::new(),
            commands: receiver,
        };

        let handle = tokio::spawn(actor.run());
        (Self { commands }, handle)
    }

    /// Register `sender` under `subscriber` for every topic
    pub async fn subscribe<I, S>(
        &self,
        subscriber: SubscriberId,
        sender: &mpsc::Sender<Envelope>,
        topics: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dispatch(Command::Subscribe {
            subscriber,
            sender: sender.clone(),
            topics: topic_list(topics),
        })
        .await
    }

    /// Fan out to every topic, waiting for subscriber buffer space
    pub async fn publish<I, S>(&self, envelope: Envelope, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dispatch(Command::Publish {
            envelope,
            topics: topic_list(topics),
        })
        .await
    }

    /// Fan out to every topic, skipping subscribers whose buffer is full
    pub async fn publish_async<I, S>(&self, envelope: Envelope, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dispatch(Command::AsyncPublish {
            envelope,
            topics: topic_list(topics),
        })
        .await
    }

    /// Remove the listed memberships; an empty list removes all of them
    pub async fn unsubscribe<I, S>(&self, subscriber: SubscriberId, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics = topic_list(topics);
        if topics.is_empty() {
            return self.unsubscribe_all(subscriber).await;
        }

        self.dispatch(Command::Unsubscribe { subscriber, topics })
            .await
    }

    pub async fn unsubscribe_all(&self, subscriber: SubscriberId) -> Result<()> {
        self.dispatch(Command::UnsubscribeAll { subscriber }).await
    }

    /// Force every subscriber off the listed topics
    pub async fn close_topic<I, S>(&self, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dispatch(Command::CloseTopic {
            topics: topic_list(topics),
        })
        .await
    }

    /// Snapshot of the registry, answered after every earlier command
    pub async fn stats(&self) -> Result<TopicStats> {
        let (reply, response) = oneshot::channel();
        self.dispatch(Command::Stats { reply }).await?;
        response.await.map_err(|_| HubError::PubSubClosed)
    }

    /// Ask the actor to drain the registry and stop
    pub async fn shutdown(&self) -> Result<()> {
        self.dispatch(Command::Shutdown).await
    }

    /// True once the actor stopped accepting commands
    pub fn is_terminated(&self) -> bool {
        self.commands.is_closed()
    }

    /// Resolves once the actor stopped accepting commands
    pub async fn terminated(&self) {
        self.commands.closed().await
    }

    async fn dispatch(&self, command: Command) -> Result<()> {
        let name = command.name();
        self.commands.send(command).await.map_err(|_| {
            debug!("Dropped {} command, pub/sub actor is gone", name);
            HubError::PubSubClosed
        })
    }
}

fn topic_list<I, S>(topics: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    topics.into_iter().map(Into::into).collect()
}

struct Actor {
    registry: Registry,
    commands: mpsc::Receiver<Command>,
}

impl Actor {
    async fn run(mut self) {
        info!("📡 PubSub actor started");

        while let Some(command) = self.commands.recv().await {
            if matches!(command, Command::Shutdown) {
                // Refuse new commands before draining
                self.commands.close();
                break;
            }
            self.handle(command).await;
        }

        let released = self.registry.drain();
        info!("🛑 PubSub actor stopped ({} subscriber channels released)", released);
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Subscribe {
                subscriber,
                sender,
                topics,
            } => {
                for topic in &topics {
                    self.registry.add(topic, subscriber, &sender);
                }
                debug!("Subscriber {} joined {:?}", subscriber, topics);
            }

            Command::Publish { envelope, topics } => {
                for topic in &topics {
                    let delivered = self.registry.send(topic, &envelope).await;
                    debug!("Published to {} ({} subscribers)", topic, delivered);
                }
            }

            Command::AsyncPublish { envelope, topics } => {
                for topic in &topics {
                    let delivered = self.registry.send_async(topic, &envelope);
                    debug!("Async published to {} ({} subscribers)", topic, delivered);
                }
            }

            Command::Unsubscribe { subscriber, topics } => {
                for topic in &topics {
                    self.registry.remove(topic, subscriber);
                }
                debug!("Subscriber {} left {:?}", subscriber, topics);
            }

            Command::UnsubscribeAll { subscriber } => {
                if self.registry.remove_subscriber(subscriber) {
                    debug!("Subscriber {} left every topic", subscriber);
                }
            }

            Command::CloseTopic { topics } => {
                for topic in &topics {
                    let released = self.registry.remove_topic(topic);
                    debug!("Closed topic {} ({} channels released)", topic, released);
                }
            }

            Command::Stats { reply } => {
                // Requester may have given up
                let _ = reply.send(self.registry.stats());
            }

            // Intercepted by the run loop
            Command::Shutdown => {}
        }
    }
}
