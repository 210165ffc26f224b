//! Chatroom behaviour wired onto the hub callbacks
//!
//! - connect: the session gets a UUID and everyone hears who arrived
//! - login: remembers the user id and joins the public channel
//! - join/leave: topic membership
//! - send: async publish of a `receive_message` to the named channel
//! - disconnect: everyone hears who left and how many remain

use crate::error::Result;
use crate::protocol::{Ack, ClientMessage, ServerMessage};
use bytes::Bytes;
use relay_hub::{Hub, Session};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const UID_KEY: &str = "uid";
const USER_ID_KEY: &str = "user_id";

/// Application state shared by every callback
#[derive(Clone)]
pub struct ChatHandler {
    hub: Hub,
    public_channel: Arc<str>,
}

impl ChatHandler {
    pub fn new(hub: Hub, public_channel: impl Into<Arc<str>>) -> Self {
        Self {
            hub,
            public_channel: public_channel.into(),
        }
    }

    /// Register every chatroom callback on the hub
    pub fn install(self) {
        let hub = self.hub.clone();

        let handler = self.clone();
        hub.on_connect(move |session| {
            let handler = handler.clone();
            async move { handler.on_connect(&session) }
        });

        let handler = self.clone();
        hub.on_disconnect(move |session| {
            let handler = handler.clone();
            async move { handler.on_disconnect(&session) }
        });

        let handler = self.clone();
        hub.on_message(move |session, payload| {
            let handler = handler.clone();
            async move { handler.on_message(session, payload).await }
        });

        // Binary frames carry the same JSON
        let handler = self;
        hub.on_message_binary(move |session, payload| {
            let handler = handler.clone();
            async move { handler.on_message(session, payload).await }
        });

        hub.on_error(|session, error| {
            if error.is_fatal() {
                debug!("Session {} ended: {}", session.id(), error);
            } else {
                warn!("Session {}: {}", session.id(), error);
            }
        });
    }

    fn on_connect(&self, session: &Arc<Session>) {
        let uid = Uuid::new_v4();
        session.set(UID_KEY, uid);
        info!("👤 User [{}] connected from {:?}", uid, session.peer_addr());

        self.announce(format!("User [{}] has joined!", uid));
    }

    fn on_disconnect(&self, session: &Arc<Session>) {
        let uid = session
            .get::<Uuid>(UID_KEY)
            .map(|uid| uid.to_string())
            .unwrap_or_else(|| session.id().to_string());

        let remaining = self.hub.len();
        info!("👋 User [{}] disconnected ({} online)", uid, remaining);

        self.announce(format!("User [{}] has left! Online: {}", uid, remaining));
    }

    async fn on_message(&self, session: Arc<Session>, payload: Bytes) {
        let request = match ClientMessage::from_slice(&payload) {
            Ok(request) => request,
            Err(e) => {
                warn!("Session {} sent an unreadable request: {}", session.id(), e);
                return;
            }
        };

        if let Err(e) = self.dispatch(&session, request).await {
            warn!("Session {} request failed: {}", session.id(), e);
        }
    }

    /// Run one client request
    pub async fn dispatch(&self, session: &Arc<Session>, request: ClientMessage) -> Result<()> {
        match request {
            ClientMessage::Login { user_id } => {
                session.set(USER_ID_KEY, user_id);
                let joined = session.add_sub([self.public_channel.as_ref()]).await;
                reply(session, ServerMessage::Login(Ack::from_result(&joined)))
            }

            ClientMessage::JoinChannel { channel_name } => {
                let joined = session.add_sub([channel_name]).await;
                reply(session, ServerMessage::JoinChannel(Ack::from_result(&joined)))
            }

            ClientMessage::LeaveChannel { channel_name } => {
                let left = session.un_sub([channel_name]).await;
                reply(session, ServerMessage::LeaveChannel(Ack::from_result(&left)))
            }

            ClientMessage::SendMessage { channel_name, msg } => {
                let user_id = session
                    .get::<u64>(USER_ID_KEY)
                    .map(|id| *id)
                    .unwrap_or_default();

                let message = ServerMessage::ReceiveMessage {
                    user_id,
                    channel_name: channel_name.clone(),
                    msg,
                };
                self.hub
                    .pub_msg(message.to_json()?, true, [channel_name])
                    .await?;
                Ok(())
            }
        }
    }

    fn announce(&self, msg: String) {
        match (ServerMessage::Notice { msg }).to_json() {
            Ok(json) => {
                if let Err(e) = self.hub.broadcast(json) {
                    debug!("Announcement skipped: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode announcement: {}", e),
        }
    }
}

fn reply(session: &Arc<Session>, message: ServerMessage) -> Result<()> {
    session.write(message.to_json()?)?;
    Ok(())
}
