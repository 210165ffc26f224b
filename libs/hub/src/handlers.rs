//! Lifecycle callback slots.
//!
//! Each slot holds at most one handler; registering again replaces it.
//! Handlers are cloned out of the lock before they run, so a handler may
//! register other handlers or await hub operations freely.

use crate::session::Session;
use crate::Result;
use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;

type SessionHandler = Arc<dyn Fn(Arc<Session>) -> BoxFuture<'static, ()> + Send + Sync>;
type MessageHandler = Arc<dyn Fn(Arc<Session>, Bytes) -> BoxFuture<'static, ()> + Send + Sync>;
type SentHandler = Arc<dyn Fn(&Arc<Session>, &Bytes) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&Arc<Session>, &crate::HubError) + Send + Sync>;
type PongHandler = Arc<dyn Fn(&Arc<Session>) + Send + Sync>;
type CloseHandler = Arc<dyn Fn(&Arc<Session>, u16, &str) -> Result<()> + Send + Sync>;

#[derive(Default, Clone)]
struct Slots {
    connect: Option<SessionHandler>,
    disconnect: Option<SessionHandler>,
    message: Option<MessageHandler>,
    message_binary: Option<MessageHandler>,
    message_sent: Option<SentHandler>,
    message_sent_binary: Option<SentHandler>,
    error: Option<ErrorHandler>,
    pong: Option<PongHandler>,
    close: Option<CloseHandler>,
}

#[derive(Default)]
pub(crate) struct Handlers {
    slots: RwLock<Slots>,
}

fn session_handler<F, Fut>(handler: F) -> SessionHandler
where
    F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |session| Box::pin(handler(session)))
}

fn message_handler<F, Fut>(handler: F) -> MessageHandler
where
    F: Fn(Arc<Session>, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |session, payload| Box::pin(handler(session, payload)))
}

impl Handlers {
    pub fn set_connect<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.slots.write().connect = Some(session_handler(handler));
    }

    pub fn set_disconnect<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.slots.write().disconnect = Some(session_handler(handler));
    }

    pub fn set_message<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<Session>, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.slots.write().message = Some(message_handler(handler));
    }

    pub fn set_message_binary<F, Fut>(&self, handler: F)
    where
        F: Fn(Arc<Session>, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.slots.write().message_binary = Some(message_handler(handler));
    }

    pub fn set_message_sent<F>(&self, handler: F)
    where
        F: Fn(&Arc<Session>, &Bytes) + Send + Sync + 'static,
    {
        self.slots.write().message_sent = Some(Arc::new(handler));
    }

    pub fn set_message_sent_binary<F>(&self, handler: F)
    where
        F: Fn(&Arc<Session>, &Bytes) + Send + Sync + 'static,
    {
        self.slots.write().message_sent_binary = Some(Arc::new(handler));
    }

    pub fn set_error<F>(&self, handler: F)
    where
        F: Fn(&Arc<Session>, &crate::HubError) + Send + Sync + 'static,
    {
        self.slots.write().error = Some(Arc::new(handler));
    }

    pub fn set_pong<F>(&self, handler: F)
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        self.slots.write().pong = Some(Arc::new(handler));
    }

    pub fn set_close<F>(&self, handler: F)
    where
        F: Fn(&Arc<Session>, u16, &str) -> Result<()> + Send + Sync + 'static,
    {
        self.slots.write().close = Some(Arc::new(handler));
    }

    pub async fn connect(&self, session: &Arc<Session>) {
        let handler = self.slots.read().connect.clone();
        if let Some(handler) = handler {
            handler(session.clone()).await;
        }
    }

    pub async fn disconnect(&self, session: &Arc<Session>) {
        let handler = self.slots.read().disconnect.clone();
        if let Some(handler) = handler {
            handler(session.clone()).await;
        }
    }

    pub async fn message(&self, session: &Arc<Session>, payload: Bytes) {
        let handler = self.slots.read().message.clone();
        if let Some(handler) = handler {
            handler(session.clone(), payload).await;
        }
    }

    pub async fn message_binary(&self, session: &Arc<Session>, payload: Bytes) {
        let handler = self.slots.read().message_binary.clone();
        if let Some(handler) = handler {
            handler(session.clone(), payload).await;
        }
    }

    pub fn message_sent(&self, session: &Arc<Session>, payload: &Bytes) {
        let handler = self.slots.read().message_sent.clone();
        if let Some(handler) = handler {
            handler(session, payload);
        }
    }

    pub fn message_sent_binary(&self, session: &Arc<Session>, payload: &Bytes) {
        let handler = self.slots.read().message_sent_binary.clone();
        if let Some(handler) = handler {
            handler(session, payload);
        }
    }

    pub fn error(&self, session: &Arc<Session>, error: &crate::HubError) {
        let handler = self.slots.read().error.clone();
        if let Some(handler) = handler {
            handler(session, error);
        }
    }

    pub fn pong(&self, session: &Arc<Session>) {
        let handler = self.slots.read().pong.clone();
        if let Some(handler) = handler {
            handler(session);
        }
    }

    /// Run the close handler; `Ok` when none is registered
    pub fn close(&self, session: &Arc<Session>, code: u16, reason: &str) -> Result<()> {
        let handler = self.slots.read().close.clone();
        match handler {
            Some(handler) => handler(session, code, reason),
            None => Ok(()),
        }
    }
}
