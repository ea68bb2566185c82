/// Lệnh UI gửi xuống tầng mạng.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Send a chat message over the socket (already trimmed, non-empty).
    SendMessage(String),
    /// A local keystroke in the input box; drives the typing debouncer.
    Keystroke,
    /// Explicit typing notification. Sent as is; the debouncer only records
    /// it so the current burst does not announce itself twice.
    SetTyping(bool),
}
