//! Chatroom server configuration
//!
//! ```toml
//! bind_address = "127.0.0.1"
//! port = 5000
//! public_channel = "public"
//!
//! [hub]
//! subscription_buffer_size = 100
//! ```

use crate::error::{ChatroomError, Result};
use relay_hub::HubConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatroomConfig {
    /// WebSocket server bind address
    pub bind_address: String,

    /// WebSocket server port
    pub port: u16,

    /// Channel every client joins on login
    pub public_channel: String,

    /// Session timing and buffer sizes
    pub hub: HubConfig,
}

impl Default for ChatroomConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5000,
            public_channel: "public".to_string(),
            hub: HubConfig {
                subscription_buffer_size: 100,
                ..HubConfig::default()
            },
        }
    }
}

impl ChatroomConfig {
    /// Load from a TOML file, or JSON when the extension says so
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config: Self = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&contents)?
        } else {
            toml::from_str(&contents)?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| ChatroomError::Configuration {
                message: format!("Invalid bind address: {}", e),
            })
    }

    pub fn validate(&self) -> Result<()> {
        if self.public_channel.trim().is_empty() {
            return Err(ChatroomError::Configuration {
                message: "public_channel must not be empty".to_string(),
            });
        }

        self.socket_addr()?;
        self.hub.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ChatroomConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr().unwrap().port(), 5000);
    }

    #[test]
    fn test_toml_with_hub_table() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
port = 6000
public_channel = "lobby"

[hub]
pong_wait_ms = 20000
ping_period_ms = 18000
"#
        )
        .unwrap();

        let config = ChatroomConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.public_channel, "lobby");
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.hub.pong_wait_ms, 20_000);
        assert_eq!(config.hub.max_message_size, 512);
    }

    #[test]
    fn test_json_config() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"port": 7000, "hub": {{"max_message_size": 4096}}}}"#).unwrap();

        let config = ChatroomConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.hub.max_message_size, 4096);
    }

    #[test]
    fn test_invalid_hub_timing_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "[hub]\npong_wait_ms = 1000\nping_period_ms = 2000\n").unwrap();

        assert!(matches!(
            ChatroomConfig::from_file(file.path()),
            Err(ChatroomError::Hub(_))
        ));
    }

    #[test]
    fn test_bad_bind_address_rejected() {
        let config = ChatroomConfig {
            bind_address: "not an address".to_string(),
            ..ChatroomConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ChatroomError::Configuration { .. })
        ));
    }
}
