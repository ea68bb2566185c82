use std::time::{Duration, Instant};

/// Tracks the counterpart's online and typing state from inbound control
/// frames. Frames about the local user are ignored.
#[derive(Debug)]
pub struct PresenceTracker {
    local_user_id: String,
    peer_online: bool,
    typing_since: Option<Instant>,
    typing_expiry: Option<Duration>,
}

impl PresenceTracker {
    /// `typing_expiry` of `None` trusts the peer's explicit stop frame and
    /// never clears the indicator on its own.
    pub fn new(local_user_id: impl Into<String>, typing_expiry: Option<Duration>) -> Self {
        Self {
            local_user_id: local_user_id.into(),
            peer_online: false,
            typing_since: None,
            typing_expiry,
        }
    }

    /// Returns true when the visible state changed.
    pub fn set_online(&mut self, user_id: &str, online: bool) -> bool {
        if self.is_local(user_id) {
            return false;
        }
        let changed = self.peer_online != online;
        self.peer_online = online;
        if !online && self.typing_since.take().is_some() {
            return true;
        }
        changed
    }

    /// Returns true when the visible state changed.
    pub fn set_typing(&mut self, user_id: &str, is_typing: bool, now: Instant) -> bool {
        if self.is_local(user_id) {
            return false;
        }
        let was_typing = self.peer_typing(now);
        self.typing_since = is_typing.then_some(now);
        was_typing != is_typing
    }

    pub fn peer_online(&self) -> bool {
        self.peer_online
    }

    pub fn peer_typing(&self, now: Instant) -> bool {
        match (self.typing_since, self.typing_expiry) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(since), Some(expiry)) => now.saturating_duration_since(since) < expiry,
        }
    }

    /// Forget everything about the peer, e.g. when the socket drops.
    pub fn reset(&mut self) {
        self.peer_online = false;
        self.typing_since = None;
    }

    fn is_local(&self, user_id: &str) -> bool {
        !user_id.is_empty() && user_id == self.local_user_id
    }
}
