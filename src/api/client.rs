use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::common::ChatMessage;
use crate::config::{AppConfig, HistorySource};
use crate::error::ApiError;

use super::models::{
    ChatSessionSummary, HistoryPage, MarkReadResponse, SendMessageRequest, StoredMessage,
};

/// Fetches a window of persisted messages for a session.
///
/// Implementations are read-only and do not retry; the caller owns the
/// retry policy.
#[async_trait]
pub trait HistoryLoader: Send + Sync {
    async fn load_history(
        &self,
        session_key: &str,
        page: HistoryPage,
    ) -> Result<Vec<ChatMessage>, ApiError>;
}

/// REST client for the chat endpoints. Every request carries the bearer
/// token when one is configured; the token itself is opaque here.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
    history_source: HistorySource,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ApiError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: Url::parse(base_url)?,
            token,
            history_source: HistorySource::MatchRelations,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        Ok(Self::new(&config.api_base_url, config.api_token.clone())?
            .with_history_source(config.history_source))
    }

    pub fn with_history_source(mut self, source: HistorySource) -> Self {
        self.history_source = source;
        self
    }

    /// `GET /chat-sessions`
    pub async fn list_sessions(&self) -> Result<Vec<ChatSessionSummary>, ApiError> {
        let url = self.endpoint(&["chat-sessions"])?;
        self.fetch_json(self.request(Method::GET, url)).await
    }

    /// `POST /chat-sessions?other_user_id=..` returns the existing session
    /// with that user or creates one.
    pub async fn create_or_get_session(
        &self,
        other_user_id: &str,
    ) -> Result<ChatSessionSummary, ApiError> {
        let url = self.endpoint(&["chat-sessions"])?;
        let request = self
            .request(Method::POST, url)
            .query(&[("other_user_id", other_user_id)]);
        self.fetch_json(request).await
    }

    /// `GET /chat-sessions/{id}/messages?limit&offset`, oldest first.
    pub async fn session_messages(
        &self,
        session_id: &str,
        page: HistoryPage,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        let url = self.endpoint(&["chat-sessions", session_id, "messages"])?;
        let request = self.request(Method::GET, url).query(&page_query(page));
        let messages = self.fetch_json(request).await?;
        Ok(chronological(messages))
    }

    /// `POST /chat-sessions/{id}/messages`. Fallback path for sending when
    /// the socket is not used.
    pub async fn send_message(
        &self,
        session_id: &str,
        body: &SendMessageRequest,
    ) -> Result<StoredMessage, ApiError> {
        let url = self.endpoint(&["chat-sessions", session_id, "messages"])?;
        self.fetch_json(self.request(Method::POST, url).json(body))
            .await
    }

    /// `PUT /chat-sessions/{id}/messages/mark-read[?up_to_sequence=n]`
    pub async fn mark_read(
        &self,
        session_id: &str,
        up_to_sequence: Option<i64>,
    ) -> Result<MarkReadResponse, ApiError> {
        let url = self.endpoint(&["chat-sessions", session_id, "messages", "mark-read"])?;
        let mut request = self.request(Method::PUT, url);
        if let Some(sequence) = up_to_sequence {
            request = request.query(&[("up_to_sequence", sequence)]);
        }
        self.fetch_json(request).await
    }

    /// Legacy `GET /match-relations/{id}/realtime-messages?limit&offset`,
    /// oldest first.
    pub async fn realtime_messages(
        &self,
        match_id: &str,
        page: HistoryPage,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        let url = self.endpoint(&["match-relations", match_id, "realtime-messages"])?;
        let request = self.request(Method::GET, url).query(&page_query(page));
        let messages = self.fetch_json(request).await?;
        Ok(chronological(messages))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match self.token.as_deref().map(bearer) {
            Some(Some(value)) => builder.header(AUTHORIZATION, value),
            Some(None) => {
                log::warn!("Bearer token contains invalid header characters; sending without it");
                builder
            }
            None => builder,
        }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = check_status(request.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl HistoryLoader for ApiClient {
    async fn load_history(
        &self,
        session_key: &str,
        page: HistoryPage,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let stored = match self.history_source {
            HistorySource::ChatSessions => self.session_messages(session_key, page).await?,
            HistorySource::MatchRelations => self.realtime_messages(session_key, page).await?,
        };
        log::debug!("Loaded {} history messages for {session_key}", stored.len());
        Ok(stored.into_iter().map(ChatMessage::from).collect())
    }
}

fn bearer(token: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).ok()?;
    value.set_sensitive(true);
    Some(value)
}

fn page_query(page: HistoryPage) -> [(&'static str, u32); 2] {
    [("limit", page.limit), ("offset", page.offset)]
}

/// Servers page newest-first and may or may not reverse the window; sort by
/// sequence so callers always see oldest first. The sort is stable, so
/// equal sequence numbers keep server order.
fn chronological(mut messages: Vec<StoredMessage>) -> Vec<StoredMessage> {
    messages.sort_by_key(|message| message.sequence_number);
    messages
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let reason = status.canonical_reason().unwrap_or("request failed");
    Err(ApiError::Status {
        status: status.as_u16(),
        detail: error_detail(&body, reason),
    })
}

/// Pulls the human-readable `detail` out of an error body. Validation
/// errors carry a list there instead of a string.
fn error_detail(body: &str, fallback: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(detail)) => detail.clone(),
            Some(other) => other.to_string(),
            None if body.trim().is_empty() => fallback.to_string(),
            None => body.trim().to_string(),
        },
        Err(_) if body.trim().is_empty() => fallback.to_string(),
        Err(_) => body.trim().to_string(),
    }
}
