use thiserror::Error;

/// REST failures surfaced by the history loader and the session API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// True for 401/403, which the caller usually presents differently
    /// from a plain outage.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 403, .. })
    }
}

/// Socket-level failures. These never escape the network task; they drive
/// the reconnect path instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("connection closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Errors returned by [`crate::network::ChatHandle`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("not connected")]
    NotConnected,

    #[error("message is empty")]
    EmptyMessage,

    #[error("command queue is full")]
    QueueFull,

    #[error("chat session has been torn down")]
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("route has no session id: {0}")]
    MissingSessionKey(String),

    #[error("no signed-in user")]
    MissingLocalUser,

    #[error("invalid route `{route}`: {reason}")]
    InvalidRoute { route: String, reason: String },

    #[error("invalid websocket base url `{0}`")]
    InvalidWsBase(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}
