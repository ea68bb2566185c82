pub mod client;
pub mod transport;
pub mod typing;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{ChatClient, ChatHandle, ClientSettings};
pub use transport::{Connector, Frame, FrameTransport, WsConnector};
pub use typing::TypingDebouncer;
