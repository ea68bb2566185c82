//! Merges the REST backlog and the live socket stream into one sequence.
//!
//! The sequence only ever grows and visible entries never move relative to
//! each other: `seed` folds a fresh backlog into what is already shown, and
//! `append` suppresses duplicates by id. Both the backlog (re-fetched on
//! every reconnect) and the live stream can deliver the same message, so the
//! id check is what keeps the view clean.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::common::ChatMessage;

#[derive(Debug, Default)]
pub struct Reconciler {
    messages: Vec<ChatMessage>,
    ids: HashSet<String>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a backlog window (oldest first) into the sequence. Entries
    /// already visible keep their relative order; backlog entries not yet
    /// seen are inserted in front of the first visible entry that is newer
    /// (by server sequence, else by timestamp), or at the end. A visible
    /// copy that lacked a server sequence picks it up from the backlog.
    pub fn seed(&mut self, backlog: Vec<ChatMessage>) {
        let mut inserted = 0;

        for message in backlog {
            if self.ids.contains(&message.id) {
                if let Some(visible) = self
                    .messages
                    .iter_mut()
                    .find(|visible| visible.id == message.id && !visible.is_system())
                {
                    visible.sequence = visible.sequence.or(message.sequence);
                }
                continue;
            }

            let at = self
                .messages
                .iter()
                .position(|visible| chat_order(visible, &message) == Ordering::Greater)
                .unwrap_or(self.messages.len());
            self.ids.insert(message.id.clone());
            self.messages.insert(at, message);
            inserted += 1;
        }

        log::debug!(
            "Seeded {inserted} backlog messages, {} visible in total",
            self.messages.len()
        );
    }

    /// Appends a live entry. Text messages already present are dropped and
    /// `false` is returned. System notices are never backfilled, so they
    /// skip the duplicate check; a colliding notice id is replaced to keep
    /// ids unique.
    pub fn append(&mut self, mut message: ChatMessage) -> bool {
        if self.ids.contains(&message.id) {
            if !message.is_system() {
                log::debug!("Dropping duplicate message {}", message.id);
                return false;
            }
            message.id = format!("system-{}", Uuid::new_v4());
        }
        self.ids.insert(message.id.clone());
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Highest server sequence number seen so far.
    pub fn last_sequence(&self) -> Option<i64> {
        self.messages.iter().filter_map(|m| m.sequence).max()
    }
}

/// Orders two entries by server sequence when both carry one, else by
/// timestamp. Unparseable timestamps compare equal.
fn chat_order(a: &ChatMessage, b: &ChatMessage) -> Ordering {
    if let (Some(a), Some(b)) = (a.sequence, b.sequence) {
        return a.cmp(&b);
    }
    match (parse_time(&a.timestamp), parse_time(&b.timestamp)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => Ordering::Equal,
    }
}

/// Live frames carry RFC 3339; stored rows are naive UTC.
fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .or_else(|_| value.parse::<NaiveDateTime>().map(|at| at.and_utc()))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MessageKind;

    fn text(id: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            sender_id: "u1".into(),
            sender_name: "alice".into(),
            content: format!("content {id}"),
            timestamp: "2025-03-01T10:00:00Z".into(),
            kind: MessageKind::Text,
            sequence: None,
        }
    }

    fn system(id: &str) -> ChatMessage {
        ChatMessage {
            kind: MessageKind::System,
            sender_id: "system".into(),
            ..text(id)
        }
    }

    /// Message `n` as stored by the server, one minute apart.
    fn numbered(n: i64) -> ChatMessage {
        ChatMessage {
            id: n.to_string(),
            timestamp: format!("2025-03-01T{:02}:{:02}:00", 10 + n / 60, n % 60),
            sequence: Some(n),
            ..text("")
        }
    }

    fn sequence_ids(reconciler: &Reconciler) -> Vec<i64> {
        reconciler
            .messages()
            .iter()
            .map(|m| m.id.parse().expect("numeric id"))
            .collect()
    }

    fn ids(reconciler: &Reconciler) -> Vec<&str> {
        reconciler.messages().iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn live_copy_of_backlog_message_is_dropped() {
        let mut reconciler = Reconciler::new();
        reconciler.seed(vec![text("m1")]);

        assert!(!reconciler.append(text("m1")));
        assert_eq!(reconciler.len(), 1);
    }

    #[test]
    fn live_messages_append_in_arrival_order() {
        let mut reconciler = Reconciler::new();
        reconciler.seed(vec![text("m1"), text("m2")]);
        assert!(reconciler.append(text("m4")));
        assert!(reconciler.append(text("m3")));

        assert_eq!(ids(&reconciler), ["m1", "m2", "m4", "m3"]);
    }

    #[test]
    fn reseed_after_reconnect_keeps_visible_positions() {
        let mut reconciler = Reconciler::new();
        reconciler.seed(vec![text("m1")]);
        reconciler.append(system("welcome"));
        reconciler.append(text("m2"));

        // m2 was persisted meanwhile and m3 arrived while offline.
        reconciler.seed(vec![text("m1"), text("m2"), text("m3")]);

        assert_eq!(ids(&reconciler), ["m1", "welcome", "m2", "m3"]);
    }

    #[test]
    fn sliding_backlog_window_keeps_chronological_order() {
        let mut reconciler = Reconciler::new();
        reconciler.seed((1..=50).map(numbered).collect());
        for n in 51..=60 {
            // Live frames may arrive without a server sequence.
            reconciler.append(ChatMessage {
                sequence: None,
                ..numbered(n)
            });
        }
        let before = sequence_ids(&reconciler);

        reconciler.seed((11..=60).map(numbered).collect());

        assert_eq!(sequence_ids(&reconciler), before);
        assert_eq!(sequence_ids(&reconciler), (1..=60).collect::<Vec<_>>());
        assert_eq!(reconciler.last_sequence(), Some(60));
    }

    #[test]
    fn backlog_fills_gaps_missed_while_offline() {
        let mut reconciler = Reconciler::new();
        reconciler.seed((1..=5).map(numbered).collect());
        reconciler.append(numbered(6));
        reconciler.append(system("reconnected"));
        reconciler.append(numbered(9));

        reconciler.seed((4..=10).map(numbered).collect());

        let order: Vec<String> = reconciler.messages().iter().map(|m| m.id.clone()).collect();
        assert_eq!(
            order,
            ["1", "2", "3", "4", "5", "6", "reconnected", "7", "8", "9", "10"]
        );
    }

    #[test]
    fn seed_drops_duplicates_inside_the_backlog() {
        let mut reconciler = Reconciler::new();
        reconciler.seed(vec![text("m1"), text("m1"), text("m2")]);
        assert_eq!(ids(&reconciler), ["m1", "m2"]);
    }

    #[test]
    fn system_notices_bypass_the_duplicate_check() {
        let mut reconciler = Reconciler::new();
        reconciler.append(system("notice"));
        assert!(reconciler.append(system("notice")));

        assert_eq!(reconciler.len(), 2);
        let unique: HashSet<_> = reconciler.messages().iter().map(|m| &m.id).collect();
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn last_sequence_tracks_server_numbers() {
        let mut reconciler = Reconciler::new();
        assert_eq!(reconciler.last_sequence(), None);
        reconciler.seed(vec![
            ChatMessage {
                sequence: Some(3),
                ..text("a")
            },
            ChatMessage {
                sequence: Some(9),
                ..text("b")
            },
        ]);
        reconciler.append(system("hello"));
        assert_eq!(reconciler.last_sequence(), Some(9));
    }
}
