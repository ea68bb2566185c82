pub mod commands;
pub mod events;
pub mod frames;
pub mod types;

pub use commands::ChatCommand;
pub use events::ChatEvent;
pub use frames::{InboundFrame, OutboundFrame};
pub use types::{ChatMessage, ConnectionStatus, MessageKind};
