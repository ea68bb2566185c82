//! Line-based front end for one chat session.
//!
//! Plain lines are sent as messages. A few slash commands drive the rest:
//! `/typing` reports a keystroke, `/stop` clears the typing state,
//! `/dismiss` hides the current error and `/quit` leaves.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::api::ApiClient;
use crate::common::{ChatEvent, ChatMessage, ConnectionStatus};
use crate::network::ChatHandle;

use super::state::ChatState;

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Send(&'a str),
    Keystroke,
    StopTyping,
    Dismiss,
    Quit,
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/quit" | "/exit" => Input::Quit,
        "/typing" => Input::Keystroke,
        "/stop" => Input::StopTyping,
        "/dismiss" => Input::Dismiss,
        text => Input::Send(text),
    }
}

pub struct TerminalChat {
    state: ChatState,
    handle: ChatHandle,
    events: mpsc::Receiver<ChatEvent>,
    local_user_id: String,
    showed_typing: bool,
    read_receipts: Option<ReadReceipts>,
}

/// Where to report how far the history has been read.
struct ReadReceipts {
    api: ApiClient,
    session_id: String,
}

impl TerminalChat {
    pub fn new(
        handle: ChatHandle,
        events: mpsc::Receiver<ChatEvent>,
        local_user_id: impl Into<String>,
        peer_name: impl Into<String>,
        typing_expiry: Option<Duration>,
    ) -> Self {
        let local_user_id = local_user_id.into();
        Self {
            state: ChatState::new(local_user_id.clone(), peer_name, typing_expiry),
            handle,
            events,
            local_user_id,
            showed_typing: false,
            read_receipts: None,
        }
    }

    /// Marks the session read up to the newest loaded message whenever the
    /// backlog arrives. Only chat-session ids are accepted by the endpoint.
    pub fn with_read_receipts(mut self, api: ApiClient, session_id: impl Into<String>) -> Self {
        self.read_receipts = Some(ReadReceipts {
            api,
            session_id: session_id.into(),
        });
        self
    }

    /// Runs until `/quit`, end of input or the network task going away.
    /// The session is torn down on return.
    pub async fn run(mut self) -> io::Result<()> {
        println!("Chatting with {} (/quit to leave)", self.state.peer_name());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut refresh = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event)?,
                        None => break,
                    }
                }
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if !self.handle_input(&line) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                // Only matters when a local typing expiry is configured.
                _ = refresh.tick() => self.render_typing()?,
            }
        }

        self.handle.shutdown().await;
        Ok(())
    }

    fn handle_event(&mut self, event: ChatEvent) -> io::Result<()> {
        let mut out = io::stdout().lock();
        match event {
            ChatEvent::BacklogLoaded(backlog) => {
                self.state.apply(ChatEvent::BacklogLoaded(backlog), Instant::now());
                writeln!(out, "--- history ---")?;
                for message in self.state.messages() {
                    writeln!(out, "{}", format_message(message, &self.local_user_id))?;
                }
                writeln!(out, "---------------")?;
                self.mark_read();
            }
            ChatEvent::MessageReceived(message) => {
                let line = format_message(&message, &self.local_user_id);
                if self
                    .state
                    .apply(ChatEvent::MessageReceived(message), Instant::now())
                {
                    writeln!(out, "{line}")?;
                }
            }
            ChatEvent::StatusChanged(status) => {
                if self.state.apply(event, Instant::now()) {
                    writeln!(out, "* {}", status_line(status))?;
                }
            }
            ChatEvent::PresenceChanged { .. } => {
                if self.state.apply(event, Instant::now()) {
                    let presence = if self.state.peer_online() {
                        "online"
                    } else {
                        "offline"
                    };
                    writeln!(out, "* {} is {presence}", self.state.peer_name())?;
                }
            }
            ChatEvent::Error(_) => {
                self.state.apply(event, Instant::now());
                if let Some(notice) = self.state.error() {
                    writeln!(out, "! {notice} (/dismiss to hide)")?;
                }
            }
            other => {
                self.state.apply(other, Instant::now());
            }
        }
        drop(out);
        self.render_typing()
    }

    fn mark_read(&self) {
        let (Some(receipts), Some(sequence)) = (&self.read_receipts, self.state.last_sequence())
        else {
            return;
        };
        let api = receipts.api.clone();
        let session_id = receipts.session_id.clone();
        tokio::spawn(async move {
            match api.mark_read(&session_id, Some(sequence)).await {
                Ok(response) => log::debug!("Marked read up to #{sequence}: {}", response.message),
                Err(err) => log::warn!("Failed to mark messages read: {err}"),
            }
        });
    }

    fn render_typing(&mut self) -> io::Result<()> {
        let typing = self.state.peer_typing(Instant::now());
        if typing != self.showed_typing {
            self.showed_typing = typing;
            if typing {
                println!("* {} is typing...", self.state.peer_name());
            }
        }
        Ok(())
    }

    /// Returns false when the user asked to leave.
    fn handle_input(&mut self, line: &str) -> bool {
        let result = match parse_input(line) {
            Input::Quit => return false,
            Input::Empty => return true,
            Input::Dismiss => {
                self.state.dismiss_error();
                return true;
            }
            Input::Send(text) => self.handle.send_message(text),
            Input::Keystroke => self.handle.keystroke(),
            Input::StopTyping => self.handle.set_typing(false),
        };
        if let Err(err) = result {
            println!("! {err}");
        }
        true
    }
}

fn status_line(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connecting => "Connecting...",
        ConnectionStatus::Connected => "Connected",
        ConnectionStatus::Disconnected => "Disconnected, retrying shortly",
    }
}

fn format_message(message: &ChatMessage, local_user_id: &str) -> String {
    let time = clock_time(&message.timestamp);
    if message.is_system() {
        return format!("[{time}] -- {} --", message.content);
    }
    let who = if message.sender_id == local_user_id {
        "You"
    } else {
        message.sender_name.as_str()
    };
    format!("[{time}] {who}: {}", message.content)
}

/// `HH:MM` in local time, or the raw value when it is not RFC 3339.
fn clock_time(timestamp: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(timestamp) {
        Ok(at) => at.with_timezone(&chrono::Local).format("%H:%M").to_string(),
        Err(_) => timestamp.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MessageKind;

    fn message(sender: &str, kind: MessageKind) -> ChatMessage {
        ChatMessage {
            id: "m-1".into(),
            sender_id: sender.into(),
            sender_name: "Alex".into(),
            content: "hello".into(),
            timestamp: "not a timestamp".into(),
            kind,
            sequence: None,
        }
    }

    #[test]
    fn slash_commands_are_recognized() {
        assert_eq!(parse_input("  /quit "), Input::Quit);
        assert_eq!(parse_input("/typing"), Input::Keystroke);
        assert_eq!(parse_input("/stop"), Input::StopTyping);
        assert_eq!(parse_input("/dismiss"), Input::Dismiss);
        assert_eq!(parse_input("   "), Input::Empty);
        assert_eq!(parse_input(" hi there "), Input::Send("hi there"));
    }

    #[test]
    fn messages_render_with_sender() {
        assert_eq!(
            format_message(&message("peer", MessageKind::Text), "me"),
            "[not a timestamp] Alex: hello"
        );
        assert_eq!(
            format_message(&message("me", MessageKind::Text), "me"),
            "[not a timestamp] You: hello"
        );
        assert_eq!(
            format_message(&message("system", MessageKind::System), "me"),
            "[not a timestamp] -- hello --"
        );
    }
}
