use serde::{Deserialize, Serialize};

use crate::common::{ChatMessage, MessageKind};

/// A chat session between the signed-in user and one peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSessionSummary {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub status: String,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub last_message_at: Option<String>,
    pub created_at: String,
}

impl ChatSessionSummary {
    /// The participant that is not `local_user_id`.
    pub fn peer_of(&self, local_user_id: &str) -> &str {
        if self.user1_id == local_user_id {
            &self.user2_id
        } else {
            &self.user1_id
        }
    }
}

/// A persisted message as returned by both the chat-session and the legacy
/// match-relation history endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub sender_user_id: String,
    #[serde(default)]
    pub sender_name: String,
    pub content: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub sequence_number: i64,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
}

fn default_message_type() -> String {
    "text".to_string()
}

impl From<StoredMessage> for ChatMessage {
    fn from(stored: StoredMessage) -> Self {
        ChatMessage {
            id: stored.id,
            sender_id: stored.sender_user_id,
            sender_name: stored.sender_name,
            content: stored.content,
            timestamp: stored.created_at,
            kind: MessageKind::from_wire(&stored.message_type),
            sequence: Some(stored.sequence_number),
        }
    }
}

/// Body of `POST /chat-sessions/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub other_user_id: String,
    pub content: String,
    pub message_type: String,
}

impl SendMessageRequest {
    pub fn text(other_user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            other_user_id: other_user_id.into(),
            content: content.into(),
            message_type: default_message_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub message: String,
}

/// Offset-based window into a session's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPage {
    pub limit: u32,
    pub offset: u32,
}

impl Default for HistoryPage {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl HistoryPage {
    pub fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }
}
