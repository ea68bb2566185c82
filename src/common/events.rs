use super::types::{ChatMessage, ConnectionStatus};

/// Sự kiện từ tầng mạng gửi lên UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    StatusChanged(ConnectionStatus),
    /// Backlog snapshot fetched after a (re)connect; replaces the seed.
    BacklogLoaded(Vec<ChatMessage>),
    MessageReceived(ChatMessage),
    PresenceChanged { user_id: String, online: bool },
    TypingChanged { user_id: String, is_typing: bool },
    /// Transient, dismissible notice for the user.
    Error(String),
    ErrorCleared,
}
