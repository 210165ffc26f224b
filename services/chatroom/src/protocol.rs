//! Chatroom wire messages
//!
//! Every frame is a JSON object `{"op": "<operation>", "data": {...}}`.

use serde::{Deserialize, Serialize};

/// Requests a client may send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Login { user_id: u64 },
    JoinChannel { channel_name: String },
    LeaveChannel { channel_name: String },
    SendMessage { channel_name: String, msg: String },
}

/// Frames the server emits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Login(Ack),
    JoinChannel(Ack),
    LeaveChannel(Ack),
    ReceiveMessage {
        user_id: u64,
        channel_name: String,
        msg: String,
    },
    /// Presence announcements (joins and departures)
    Notice { msg: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub is_success: bool,
}

impl Ack {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        Self {
            is_success: result.is_ok(),
        }
    }
}

impl ClientMessage {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_client_operations() {
        let login = ClientMessage::from_slice(br#"{"op":"login","data":{"user_id":7}}"#).unwrap();
        assert_eq!(login, ClientMessage::Login { user_id: 7 });

        let send = ClientMessage::from_slice(
            br#"{"op":"send_message","data":{"channel_name":"public","msg":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(
            send,
            ClientMessage::SendMessage {
                channel_name: "public".to_string(),
                msg: "hi".to_string()
            }
        );
    }

    #[test]
    fn test_reject_unknown_or_server_only_ops() {
        assert!(ClientMessage::from_slice(br#"{"op":"dance","data":{}}"#).is_err());
        assert!(ClientMessage::from_slice(
            br#"{"op":"receive_message","data":{"user_id":1,"channel_name":"a","msg":"b"}}"#
        )
        .is_err());
        assert!(ClientMessage::from_slice(b"not json").is_err());
    }

    #[test]
    fn test_server_message_shape() {
        let ack = ServerMessage::JoinChannel(Ack { is_success: true });
        let value: serde_json::Value = serde_json::from_str(&ack.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"op": "join_channel", "data": {"is_success": true}}));

        let received = ServerMessage::ReceiveMessage {
            user_id: 3,
            channel_name: "public".to_string(),
            msg: "yo".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&received.to_json().unwrap()).unwrap();
        assert_eq!(value["op"], "receive_message");
        assert_eq!(value["data"]["user_id"], 3);
    }
}
