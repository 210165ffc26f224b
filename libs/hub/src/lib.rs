//! # Relay Hub
//!
//! ## Purpose
//! Real-time connection hub: manages a pool of persistent bidirectional
//! connections ("sessions") and a topic-based publish/subscribe registry on
//! top of them, so applications can broadcast or route messages to many
//! concurrent peers without handling connection state, synchronization or
//! delivery backpressure themselves.
//!
//! ## Architecture Role
//!
//! ```mermaid
//! graph LR
//!     Net[TCP / WebSocket] --> Transport[FrameTransport]
//!     Transport --> ReadPump[Read pump]
//!     WritePump[Write pump] --> Transport
//!     ReadPump --> Handlers[Application handlers]
//!     Handlers --> Session
//!     Handlers --> Hub
//!     Hub -->|broadcast| Outbound[Session outbound queues]
//!     Hub -->|publish| Actor[PubSub actor]
//!     Actor -->|subscription channels| WritePump
//!     Outbound --> WritePump
//! ```
//!
//! - **PubSub actor**: single task owning every topic membership; all
//!   subscribe/publish traffic is serialized through its command queue
//! - **Session pumps**: one read task and one write task per connection; the
//!   write task is the connection's only writer
//! - **Hub**: live-session set, lifecycle callbacks, broadcast
//!
//! ## Example
//! ```rust,no_run
//! use relay_hub::{Hub, HubConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = Hub::new(HubConfig::default())?;
//! let echo = hub.clone();
//! hub.on_message(move |_session, payload| {
//!     let hub = echo.clone();
//!     async move {
//!         let _ = hub.broadcast(payload);
//!     }
//! });
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//! loop {
//!     let (stream, addr) = listener.accept().await?;
//!     let hub = hub.clone();
//!     tokio::spawn(async move { hub.accept(stream, Some(addr)).await });
//! }
//! # }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
mod handlers;
pub mod hub;
pub mod pubsub;
pub mod session;
pub mod transport;

pub use config::HubConfig;
pub use envelope::{Envelope, FrameKind, SessionFilter};
pub use error::{HubError, Result, TransportError};
pub use hub::Hub;
pub use pubsub::{PubSub, SubscriberId, TopicStats};
pub use session::{Session, SessionId};
pub use transport::{
    CloseReason, Frame, FrameSink, FrameSource, FrameTransport, MemoryPeer, MemoryTransport,
    WebSocketTransport,
};
