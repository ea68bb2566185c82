//! Client side of a persona-matching app's real-time chat.
//!
//! A session is resolved from a route, its backlog is loaded over REST and a
//! single WebSocket per session key streams live frames. [`ui::ChatState`]
//! merges both into one duplicate-free sequence and tracks the peer's
//! presence and typing state.

pub mod api;
pub mod common;
pub mod config;
pub mod error;
pub mod network;
pub mod session;
pub mod sync;
pub mod ui;
