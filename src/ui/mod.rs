pub mod state;
pub mod terminal;

pub use state::ChatState;
pub use terminal::TerminalChat;
