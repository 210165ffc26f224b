//! # Hub Configuration
//!
//! Timing and capacity knobs applied at hub construction. Loaded from TOML or
//! built in code from [`HubConfig::default`].
//!
//! ```toml
//! # chatroom.toml embeds these under a [hub] table
//! write_wait_ms = 10000         # Per-frame write deadline
//! pong_wait_ms = 60000          # Read deadline, extended by every pong
//! ping_period_ms = 54000        # Heartbeat period (must be < pong_wait_ms)
//! max_message_size = 512        # Inbound payload limit in bytes
//! message_buffer_size = 256     # Outbound queue per session
//! command_buffer_size = 256     # Pub/sub actor command queue
//! subscription_buffer_size = 256  # Subscription channel per session
//! ```
//!
//! ## Tuning
//! - Raise `message_buffer_size` if `BufferFull` errors show up for healthy
//!   clients during bursts.
//! - A small `subscription_buffer_size` makes synchronous publishes stall the
//!   actor sooner when one subscriber is slow; prefer async publishing for
//!   high fan-out topics.

use crate::{HubError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Hub timing and capacity settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HubConfig {
    /// Deadline for writing a single frame (milliseconds)
    pub write_wait_ms: u64,
    /// Read deadline, reset whenever a pong arrives (milliseconds)
    pub pong_wait_ms: u64,
    /// Interval between heartbeat pings (milliseconds)
    pub ping_period_ms: u64,
    /// Maximum inbound message payload in bytes
    pub max_message_size: usize,
    /// Capacity of each session's outbound queue
    pub message_buffer_size: usize,
    /// Capacity of the pub/sub actor's command queue
    pub command_buffer_size: usize,
    /// Capacity of each session's subscription channel
    pub subscription_buffer_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        let pong_wait_ms = 60_000;
        Self {
            write_wait_ms: 10_000,
            pong_wait_ms,
            ping_period_ms: pong_wait_ms * 9 / 10,
            max_message_size: 512,
            message_buffer_size: 256,
            command_buffer_size: 256,
            subscription_buffer_size: 256,
        }
    }
}

impl HubConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| HubError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&contents)
            .map_err(|e| HubError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_millis(self.write_wait_ms)
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms)
    }

    pub fn ping_period(&self) -> Duration {
        Duration::from_millis(self.ping_period_ms)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.write_wait_ms == 0 {
            return Err(HubError::Config("write_wait_ms must be > 0".to_string()));
        }

        if self.pong_wait_ms == 0 || self.ping_period_ms == 0 {
            return Err(HubError::Config(
                "pong_wait_ms and ping_period_ms must be > 0".to_string(),
            ));
        }

        if self.ping_period_ms >= self.pong_wait_ms {
            return Err(HubError::Config(format!(
                "ping_period_ms ({}) must be shorter than pong_wait_ms ({})",
                self.ping_period_ms, self.pong_wait_ms
            )));
        }

        if self.max_message_size == 0 {
            return Err(HubError::Config(
                "max_message_size must be > 0".to_string(),
            ));
        }

        if self.message_buffer_size == 0
            || self.command_buffer_size == 0
            || self.subscription_buffer_size == 0
        {
            return Err(HubError::Config(
                "buffer sizes must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ping_period(), Duration::from_secs(54));
        assert_eq!(config.max_message_size, 512);
    }

    #[test]
    fn test_validation_rejects_bad_timing() {
        let config = HubConfig {
            ping_period_ms: 60_000,
            ..HubConfig::default()
        };
        assert!(matches!(config.validate(), Err(HubError::Config(_))));

        let config = HubConfig {
            message_buffer_size: 0,
            ..HubConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pong_wait_ms = 2000\nping_period_ms = 1500").unwrap();

        let config = HubConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pong_wait_ms, 2000);
        assert_eq!(config.ping_period_ms, 1500);
        assert_eq!(config.write_wait_ms, 10_000);
    }

    #[test]
    fn test_from_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pong_wait_ms = 1000\nping_period_ms = 5000").unwrap();

        assert!(HubConfig::from_file(file.path()).is_err());
    }
}
