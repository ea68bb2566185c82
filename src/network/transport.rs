//! Socket abstraction for the live chat connection.
//!
//! The network task only sees [`FrameTransport`]; [`WsConnector`] backs it
//! with tokio-tungstenite in production and tests swap in an in-memory
//! connector.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::TransportError;

/// What the network task cares about from one socket read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Control frames and binary payloads; nothing to do for the chat.
    Ignored,
    Close,
}

#[async_trait]
pub trait FrameTransport: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    async fn send_ping(&mut self) -> Result<(), TransportError>;

    /// `None` once the stream is exhausted.
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports for a URL.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: FrameTransport + 'static;

    async fn connect(&self, url: &str) -> Result<Self::Transport, TransportError>;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct WsTransport {
    ws: WsStream,
}

impl WsTransport {
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(Self { ws })
    }
}

#[async_trait]
impl FrameTransport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.ws
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.ws
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        match self.ws.next().await {
            Some(Ok(Message::Text(text))) => Some(Ok(Frame::Text(text.to_string()))),
            Some(Ok(Message::Close(_))) => Some(Ok(Frame::Close)),
            // tungstenite answers pings itself on the next write/flush.
            Some(Ok(_)) => Some(Ok(Frame::Ignored)),
            Some(Err(e)) => Some(Err(TransportError::Other(e.to_string()))),
            None => None,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.ws
            .close(None)
            .await
            .map_err(|e| TransportError::Other(e.to_string()))
    }
}

pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, url: &str) -> Result<Self::Transport, TransportError> {
        WsTransport::connect(url).await
    }
}
