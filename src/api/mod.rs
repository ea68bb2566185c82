pub mod client;
pub mod models;

pub use client::{ApiClient, HistoryLoader};
pub use models::{ChatSessionSummary, HistoryPage, MarkReadResponse, SendMessageRequest, StoredMessage};
