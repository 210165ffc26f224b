//! # Chatroom
//!
//! ## Purpose
//! Multi-channel WebSocket chat server on top of `relay_hub`. Clients log in
//! to the public channel, join and leave named channels, and publish
//! messages that every channel member receives.
//!
//! ## Protocol
//! JSON frames shaped `{"op": ..., "data": {...}}`; see [`protocol`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use config::ChatroomConfig;
pub use error::{ChatroomError, Result};
pub use handlers::ChatHandler;
pub use protocol::{Ack, ClientMessage, ServerMessage};
pub use server::ChatroomServer;
