//! Chatroom WebSocket server

use crate::config::ChatroomConfig;
use crate::error::Result;
use crate::handlers::ChatHandler;
use relay_hub::Hub;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// TCP accept loop feeding the hub
pub struct ChatroomServer {
    config: ChatroomConfig,
    hub: Hub,
}

impl ChatroomServer {
    /// Validate config, start the hub and install the chatroom callbacks
    pub fn new(config: ChatroomConfig) -> Result<Self> {
        config.validate()?;

        let hub = Hub::new(config.hub.clone())?;
        ChatHandler::new(hub.clone(), config.public_channel.as_str()).install();

        Ok(Self { config, hub })
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Bind the configured address and serve until the listener fails
    pub async fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.socket_addr()?).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("🚀 Chatroom listening on {}", listener.local_addr()?);

        loop {
            let (stream, addr) = listener.accept().await?;
            if self.hub.is_closed() {
                debug!("Refusing {} after shutdown", addr);
                continue;
            }

            let hub = self.hub.clone();
            tokio::spawn(async move {
                if let Err(e) = hub.accept(stream, Some(addr)).await {
                    error!("Connection from {} failed: {}", addr, e);
                }
            });
        }
    }

    /// Close every session and stop the pub/sub actor
    pub async fn shutdown(&self) -> Result<()> {
        self.hub.close().await?;
        Ok(())
    }
}
