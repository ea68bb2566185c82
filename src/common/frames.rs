//! JSON frames exchanged over the chat socket.
//!
//! Every frame is an object with a `type` discriminator. The server relays
//! `message` frames to both participants, so a client sees its own messages
//! come back through the socket.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{ChatMessage, MessageKind, SYSTEM_SENDER_ID};

/// Server → client frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    Message(MessageFrame),
    Typing(TypingFrame),
    /// Peer presence, referred to as `presence` in the domain model.
    UserStatus(PresenceFrame),
    System(SystemFrame),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFrame {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingFrame {
    #[serde(default)]
    pub user_id: String,
    pub is_typing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceFrame {
    #[serde(default)]
    pub user_id: String,
    pub is_online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemFrame {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl MessageFrame {
    /// Converts the frame into a text message. Frames without an id get a
    /// client-side one, frames without a timestamp are stamped now.
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            content: self.content,
            timestamp: self.timestamp.unwrap_or_else(now_iso),
            kind: MessageKind::Text,
            sequence: self.sequence_number,
        }
    }
}

impl SystemFrame {
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: self
                .id
                .unwrap_or_else(|| format!("system-{}", Uuid::new_v4())),
            sender_id: SYSTEM_SENDER_ID.to_string(),
            sender_name: "System".to_string(),
            content: self.content,
            timestamp: self.timestamp.unwrap_or_else(now_iso),
            kind: MessageKind::System,
            sequence: None,
        }
    }
}

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    #[serde(rename_all = "camelCase")]
    Message {
        content: String,
        sender_id: String,
        sender_name: String,
        match_id: String,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    Typing {
        is_typing: bool,
        user_id: String,
        match_id: String,
    },
}

impl OutboundFrame {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Parses one text frame. Unknown `type` values and malformed JSON both
/// come back as `Err`; callers log and drop them.
pub fn parse_inbound(text: &str) -> serde_json::Result<InboundFrame> {
    serde_json::from_str(text)
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn parses_relayed_message_frame() {
        let raw = r#"{
            "type": "message",
            "id": "42",
            "senderId": "u1",
            "senderName": "alice",
            "content": "hi",
            "timestamp": "2025-03-01T10:00:00",
            "matchId": "m9",
            "sequenceNumber": 7
        }"#;

        let InboundFrame::Message(frame) = parse_inbound(raw).expect("parse") else {
            panic!("expected message frame");
        };
        let message = frame.into_message();
        assert_eq!(message.id, "42");
        assert_eq!(message.sender_name, "alice");
        assert_eq!(message.sequence, Some(7));
        assert_eq!(message.kind, MessageKind::Text);
    }

    #[test]
    fn message_without_id_gets_generated_one() {
        let raw = r#"{"type":"message","senderId":"u1","senderName":"a","content":"x"}"#;
        let InboundFrame::Message(frame) = parse_inbound(raw).expect("parse") else {
            panic!("expected message frame");
        };
        let message = frame.into_message();
        assert!(!message.id.is_empty());
        assert!(!message.timestamp.is_empty());
    }

    #[test]
    fn user_status_maps_to_presence() {
        let raw = r#"{"type":"user_status","userId":"u2","isOnline":true,"timestamp":"t"}"#;
        match parse_inbound(raw).expect("parse") {
            InboundFrame::UserStatus(frame) => {
                assert_eq!(frame.user_id, "u2");
                assert!(frame.is_online);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn system_frame_uses_system_sender() {
        let raw = r#"{"type":"system","content":"connected"}"#;
        let InboundFrame::System(frame) = parse_inbound(raw).expect("parse") else {
            panic!("expected system frame");
        };
        let message = frame.into_message();
        assert_eq!(message.sender_id, SYSTEM_SENDER_ID);
        assert!(message.id.starts_with("system-"));
        assert!(message.is_system());
    }

    #[test]
    fn unknown_type_and_garbage_are_errors() {
        assert!(parse_inbound(r#"{"type":"video_call"}"#).is_err());
        assert!(parse_inbound("not json").is_err());
    }

    #[test]
    fn outbound_frames_use_camel_case_fields() {
        let frame = OutboundFrame::Typing {
            is_typing: true,
            user_id: "u1".into(),
            match_id: "m1".into(),
        };
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "typing");
        assert_eq!(value["isTyping"], true);
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["matchId"], "m1");

        let frame = OutboundFrame::Message {
            content: "hello".into(),
            sender_id: "u1".into(),
            sender_name: "alice".into(),
            match_id: "m1".into(),
            timestamp: "t".into(),
        };
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["senderName"], "alice");
        assert_eq!(value["matchId"], "m1");
    }
}
