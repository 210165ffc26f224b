//! Error types for the chatroom server

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatroomError {
    #[error("Hub error: {0}")]
    Hub(#[from] relay_hub::HubError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

pub type Result<T> = std::result::Result<T, ChatroomError>;
