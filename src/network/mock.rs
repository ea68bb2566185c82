//! In-memory connector and history loader for driving the network task in
//! tests.

use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::api::{HistoryLoader, HistoryPage};
use crate::common::{ChatMessage, MessageKind};
use crate::error::{ApiError, TransportError};

use super::transport::{Connector, Frame, FrameTransport};

#[derive(Debug, Default)]
pub struct Counters {
    pub attempts: AtomicUsize,
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
    pub closes: AtomicUsize,
    pub pings: AtomicUsize,
}

/// The server end of one mock connection. Dropping it closes the socket
/// from the server side.
pub struct MockServer {
    to_client: mpsc::UnboundedSender<Frame>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

impl MockServer {
    pub fn send_json(&self, value: serde_json::Value) {
        self.send_raw(&value.to_string());
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.to_client.send(Frame::Text(text.to_string()));
    }

    pub fn send_close(&self) {
        let _ = self.to_client.send(Frame::Close);
    }

    /// Frames the client has written so far, parsed as JSON.
    pub fn drain_sent(&mut self) -> Vec<serde_json::Value> {
        let mut sent = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            sent.push(serde_json::from_str(&text).expect("client sent json"));
        }
        sent
    }
}

pub struct MockConnector {
    servers: mpsc::UnboundedSender<MockServer>,
    fail_next: AtomicUsize,
    pub counters: Arc<Counters>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockServer>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let connector = Self {
            servers,
            fail_next: AtomicUsize::new(0),
            counters: Arc::new(Counters::default()),
        };
        (Arc::new(connector), accepted)
    }

    pub fn fail_next(&self, attempts: usize) {
        self.fail_next.store(attempts, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.counters.attempts.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.counters.max_live.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, _url: &str) -> Result<Self::Transport, TransportError> {
        self.counters.attempts.fetch_add(1, Ordering::SeqCst);
        let pending_failures = self.fail_next.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.fail_next.store(pending_failures - 1, Ordering::SeqCst);
            return Err(TransportError::ConnectionFailed("refused".into()));
        }

        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_live.fetch_max(live, Ordering::SeqCst);

        let _ = self.servers.send(MockServer {
            to_client,
            from_client,
        });
        Ok(MockTransport {
            incoming,
            outgoing,
            counters: Arc::clone(&self.counters),
        })
    }
}

pub struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Frame>,
    outgoing: mpsc::UnboundedSender<String>,
    counters: Arc<Counters>,
}

#[async_trait]
impl FrameTransport for MockTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.outgoing
            .send(text)
            .map_err(|_| TransportError::SendFailed("server gone".into()))
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.counters.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// History loader returning a configurable snapshot.
#[derive(Default)]
pub struct MockLoader {
    backlog: Mutex<Vec<ChatMessage>>,
    fail_next: AtomicUsize,
    fail_status: AtomicU16,
    calls: AtomicUsize,
}

impl MockLoader {
    pub fn with_backlog(backlog: Vec<ChatMessage>) -> Arc<Self> {
        let loader = Self::default();
        loader.set_backlog(backlog);
        Arc::new(loader)
    }

    pub fn set_backlog(&self, backlog: Vec<ChatMessage>) {
        *self.backlog.lock().expect("backlog lock") = backlog;
    }

    /// The next `calls` loads answer with HTTP `status`.
    pub fn fail_next(&self, calls: usize, status: u16) {
        self.fail_status.store(status, Ordering::SeqCst);
        self.fail_next.store(calls, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryLoader for MockLoader {
    async fn load_history(
        &self,
        _session_key: &str,
        page: HistoryPage,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pending_failures = self.fail_next.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.fail_next.store(pending_failures - 1, Ordering::SeqCst);
            return Err(ApiError::Status {
                status: self.fail_status.load(Ordering::SeqCst),
                detail: "history unavailable".into(),
            });
        }
        let backlog = self.backlog.lock().expect("backlog lock");
        Ok(backlog
            .iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }
}

pub fn text_message(id: &str, sender: &str) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        sender_id: sender.to_string(),
        sender_name: sender.to_string(),
        content: format!("content of {id}"),
        timestamp: "2025-03-01T10:00:00Z".to_string(),
        kind: MessageKind::Text,
        sequence: None,
    }
}
