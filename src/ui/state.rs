use std::time::{Duration, Instant};

use crate::common::{ChatEvent, ChatMessage, ConnectionStatus};
use crate::sync::{PresenceTracker, Reconciler};

/// Trạng thái cục bộ của UI cho một phiên chat.
/// Chỉ được cập nhật qua [`ChatEvent`]; phần còn lại là chỉ đọc.
#[derive(Debug)]
pub struct ChatState {
    peer_name: String,
    status: ConnectionStatus,
    error: Option<String>,
    messages: Reconciler,
    presence: PresenceTracker,
}

impl ChatState {
    pub fn new(
        local_user_id: impl Into<String>,
        peer_name: impl Into<String>,
        typing_expiry: Option<Duration>,
    ) -> Self {
        Self {
            peer_name: peer_name.into(),
            status: ConnectionStatus::Connecting,
            error: None,
            messages: Reconciler::new(),
            presence: PresenceTracker::new(local_user_id, typing_expiry),
        }
    }

    /// Folds one event into the view. Returns true when something visible
    /// changed.
    pub fn apply(&mut self, event: ChatEvent, now: Instant) -> bool {
        match event {
            ChatEvent::StatusChanged(status) => {
                if status == ConnectionStatus::Disconnected {
                    // Whatever the peer was doing is unknown until the next
                    // status frame.
                    self.presence.reset();
                }
                let changed = self.status != status;
                self.status = status;
                changed
            }
            ChatEvent::BacklogLoaded(backlog) => {
                self.messages.seed(backlog);
                true
            }
            ChatEvent::MessageReceived(message) => self.messages.append(message),
            ChatEvent::PresenceChanged { user_id, online } => {
                self.presence.set_online(&user_id, online)
            }
            ChatEvent::TypingChanged { user_id, is_typing } => {
                self.presence.set_typing(&user_id, is_typing, now)
            }
            ChatEvent::Error(notice) => {
                self.error = Some(notice);
                true
            }
            ChatEvent::ErrorCleared => self.error.take().is_some(),
        }
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.messages.messages()
    }

    pub fn last_sequence(&self) -> Option<i64> {
        self.messages.last_sequence()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    pub fn peer_online(&self) -> bool {
        self.presence.peer_online()
    }

    pub fn peer_typing(&self, now: Instant) -> bool {
        self.presence.peer_typing(now)
    }
}
