use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::Timestamp;

/// Who authored a message, derived from which sender field is populated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Message from a human user.
    User,
    /// Message from an automated agent.
    Agent,
}

impl MessageKind {
    /// Derives the kind from the human sender field. Anything without a user
    /// sender is attributed to an agent.
    #[must_use]
    pub const fn from_sender(sender_user_id: Option<&String>) -> Self {
        if sender_user_id.is_some() {
            Self::User
        } else {
            Self::Agent
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// One chat utterance in a room, in any stage of its lifecycle
/// (optimistic, persisted, or delivered over the realtime channel).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Local identifier for optimistic entries, durable identifier once persisted.
    pub id: String,

    /// Room that owns the message.
    pub room_id: String,

    /// Human sender, if any.
    pub sender_user_id: Option<String>,

    /// Agent sender, if any.
    pub sender_agent_id: Option<String>,

    /// Message body. Reserved as optional for non-text payloads.
    pub text: Option<String>,

    /// Creation time: client clock for optimistic entries, server clock once persisted.
    pub created_at: Timestamp,

    /// Last edit time.
    pub updated_at: Option<Timestamp>,

    /// Stable across the optimistic, persisted and realtime copies of one send.
    pub correlation_token: String,

    /// True while the durable write has not been confirmed.
    pub pending: bool,

    /// True once the durable write exhausted its retries.
    #[serde(default)]
    pub failed: bool,

    /// Derived from the sender fields.
    pub kind: MessageKind,
}

impl Message {
    /// Confirmed entries are the ones backed by durable storage.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        !self.pending && !self.failed
    }

    /// The instant used for last-write-wins comparisons.
    #[must_use]
    pub fn last_touched(&self) -> Timestamp {
        self.updated_at.unwrap_or(self.created_at)
    }

    /// Body text, or an empty string for non-text payloads.
    #[must_use]
    pub fn body(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// A contiguous run of messages sharing the same human sender. Only used for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageGroup {
    /// Group key. `None` groups agent messages together.
    pub sender_user_id: Option<String>,
    /// Messages in display order.
    pub messages: Vec<Message>,
}

impl MessageGroup {
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
