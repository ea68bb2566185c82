use serde::{Deserialize, Serialize};

/// Sender id carried by synthetic system notices.
pub const SYSTEM_SENDER_ID: &str = "system";

/// Kind of a delivered conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    System,
}

impl MessageKind {
    /// Maps the server's `message_type` column. Anything other than
    /// `system` is rendered as text.
    pub fn from_wire(value: &str) -> Self {
        if value.eq_ignore_ascii_case("system") {
            MessageKind::System
        } else {
            MessageKind::Text
        }
    }
}

/// Domain model đại diện một tin nhắn chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    /// Origin time, ISO-8601.
    pub timestamp: String,
    pub kind: MessageKind,
    /// Server-assigned sequence number, when the source carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
}

impl ChatMessage {
    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }
}

/// Lifecycle of the live socket for one session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        self == ConnectionStatus::Connected
    }

    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting...",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}
