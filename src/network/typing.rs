use std::time::Duration;

use tokio::time::Instant;

/// Outbound typing debounce.
///
/// The first keystroke of a burst asks for `typing=true`; every keystroke
/// pushes a single pending `typing=false` out to `delay` after itself.
#[derive(Debug)]
pub struct TypingDebouncer {
    delay: Duration,
    typing: bool,
    stop_at: Option<Instant>,
}

impl TypingDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            typing: false,
            stop_at: None,
        }
    }

    /// Registers a keystroke. Returns true when `typing=true` must be sent.
    pub fn keystroke(&mut self, now: Instant) -> bool {
        self.stop_at = Some(now + self.delay);
        if self.typing {
            return false;
        }
        self.typing = true;
        true
    }

    /// When the pending stop notification is due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.stop_at
    }

    /// Called when the deadline fires. Returns true when `typing=false`
    /// must be sent.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.stop_at {
            Some(at) if at <= now => {
                self.stop_at = None;
                std::mem::replace(&mut self.typing, false)
            }
            _ => false,
        }
    }

    /// An explicit `typing=true` went out. Keystrokes of the same burst
    /// only push the stop out; no stop is scheduled until one arrives.
    pub fn started(&mut self) {
        self.typing = true;
    }

    /// An explicit `typing=false` went out; nothing stays pending.
    pub fn stopped(&mut self) {
        self.typing = false;
        self.stop_at = None;
    }

    /// Drops any pending notification without sending it (disconnect).
    pub fn reset(&mut self) {
        self.stopped();
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }
}
