//! Subcommand implementations for the Roomline CLI.

pub mod completion;
pub mod config;
pub mod history;
pub mod send;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use client::{
    RoomSession,
    backend::HttpBackend,
    notify::{Notification, Notifier, TracingNotifier},
};
use shared::{
    config::client::Config,
    models::{Message, MessageGroup},
};

/// Surfaces pipeline notifications on stderr, where the user sees them, and
/// records them in the log.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        eprintln!("error: {}: {}", notification.title, notification.detail);
        TracingNotifier.notify(notification);
    }
}

/// Builds a room session talking to the configured HTTP backend.
fn open_room(config: &Config, room_id: &str, user_id: Option<String>) -> Result<RoomSession> {
    let backend = Arc::new(
        HttpBackend::from_config(config)
            .with_context(|| format!("invalid backend URL '{}'", config.backend_url))?,
    );
    Ok(RoomSession::new(
        room_id,
        user_id,
        backend.clone(),
        backend,
        Arc::new(ConsoleNotifier),
        config,
    ))
}

fn sender_label(message: &Message) -> &str {
    message
        .sender_user_id
        .as_deref()
        .or(message.sender_agent_id.as_deref())
        .unwrap_or("agent")
}

fn format_message(message: &Message) -> String {
    let marker = if message.failed {
        " (failed)"
    } else if message.pending {
        " (sending)"
    } else {
        ""
    };
    format!("[{}] {}{marker}", message.created_at, message.body())
}

fn print_groups(groups: &[MessageGroup]) {
    for group in groups {
        let Some(first) = group.messages.first() else {
            continue;
        };
        println!("{}:", sender_label(first));
        for message in &group.messages {
            println!("  {}", format_message(message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared::models::{MessageKind, Timestamp};

    fn message(user: Option<&str>, agent: Option<&str>) -> Message {
        Message {
            id: "1".into(),
            room_id: "room-1".into(),
            sender_user_id: user.map(str::to_string),
            sender_agent_id: agent.map(str::to_string),
            text: Some("hello".into()),
            created_at: Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap()),
            updated_at: None,
            correlation_token: "db-1".into(),
            pending: false,
            failed: false,
            kind: MessageKind::from_sender(user.map(str::to_string).as_ref()),
        }
    }

    #[test]
    fn labels_prefer_the_human_sender() {
        assert_eq!(sender_label(&message(Some("ana"), Some("bot"))), "ana");
        assert_eq!(sender_label(&message(None, Some("bot"))), "bot");
        assert_eq!(sender_label(&message(None, None)), "agent");
    }

    #[test]
    fn formatted_lines_mark_unconfirmed_entries() {
        let mut entry = message(Some("ana"), None);
        assert_eq!(format_message(&entry), "[2025-03-08 14:30:00] hello");

        entry.pending = true;
        assert!(format_message(&entry).ends_with("(sending)"));

        entry.pending = false;
        entry.failed = true;
        assert!(format_message(&entry).ends_with("(failed)"));
    }
}
