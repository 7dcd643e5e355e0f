//! Builds optimistic messages for immediate display.

use shared::models::{Message, MessageKind, Timestamp};
use uuid::Uuid;

/// Prefix for identifiers and tokens minted on this client.
pub const LOCAL_PREFIX: &str = "local-";

/// Partial message as known at send time. Everything optional is defaulted
/// by [`build_local_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMessageDraft {
    pub id: String,
    pub room_id: String,
    pub text: Option<String>,
    pub created_at: Timestamp,
    pub sender_user_id: Option<String>,
    pub sender_agent_id: Option<String>,
    pub updated_at: Option<Timestamp>,
    pub correlation_token: Option<String>,
    pub pending: Option<bool>,
}

impl LocalMessageDraft {
    /// Draft with a fresh local id stamped with the current time.
    #[must_use]
    pub fn new(room_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: format!("{LOCAL_PREFIX}{}", Uuid::new_v4()),
            room_id: room_id.into(),
            text: Some(text.into()),
            created_at: Timestamp::now(),
            sender_user_id: None,
            sender_agent_id: None,
            updated_at: None,
            correlation_token: None,
            pending: None,
        }
    }

    #[must_use]
    pub fn sent_by(mut self, user_id: Option<String>) -> Self {
        self.sender_user_id = user_id;
        self
    }
}

/// Local correlation token for a message id. Ids minted here already carry
/// the local namespace and are used as-is.
#[must_use]
pub fn local_token_for(id: &str) -> String {
    if id.starts_with(LOCAL_PREFIX) {
        id.to_string()
    } else {
        format!("{LOCAL_PREFIX}{id}")
    }
}

/// Completes a draft into a displayable message. Pending unless the draft
/// says otherwise; never fails.
#[must_use]
pub fn build_local_message(draft: LocalMessageDraft) -> Message {
    let correlation_token = draft
        .correlation_token
        .unwrap_or_else(|| local_token_for(&draft.id));
    let kind = MessageKind::from_sender(draft.sender_user_id.as_ref());

    Message {
        id: draft.id,
        room_id: draft.room_id,
        sender_user_id: draft.sender_user_id,
        sender_agent_id: draft.sender_agent_id,
        text: draft.text,
        created_at: draft.created_at,
        updated_at: draft.updated_at,
        correlation_token,
        pending: draft.pending.unwrap_or(true),
        failed: false,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn draft(id: &str) -> LocalMessageDraft {
        LocalMessageDraft {
            id: id.to_string(),
            room_id: "room-1".to_string(),
            text: Some("hi".to_string()),
            created_at: Timestamp(Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap()),
            sender_user_id: None,
            sender_agent_id: None,
            updated_at: None,
            correlation_token: None,
            pending: None,
        }
    }

    #[test]
    fn defaults_pending_token_and_kind() {
        let message = build_local_message(draft("local-1"));

        assert!(message.pending);
        assert!(!message.failed);
        assert_eq!(message.correlation_token, "local-1");
        assert_eq!(message.kind, MessageKind::Agent);
        assert_eq!(message.body(), "hi");
    }

    #[test]
    fn token_is_namespaced_for_foreign_ids() {
        let message = build_local_message(draft("42"));
        assert_eq!(message.correlation_token, "local-42");
    }

    #[test]
    fn explicit_fields_win() {
        let mut input = draft("local-2");
        input.pending = Some(false);
        input.correlation_token = Some("tok-9".to_string());
        input.sender_user_id = Some("user-1".to_string());

        let message = build_local_message(input);

        assert!(!message.pending);
        assert_eq!(message.correlation_token, "tok-9");
        assert_eq!(message.kind, MessageKind::User);
    }

    #[test]
    fn new_draft_mints_local_id() {
        let draft = LocalMessageDraft::new("room-1", "hello").sent_by(Some("user-1".into()));
        let message = build_local_message(draft);

        assert!(message.id.starts_with(LOCAL_PREFIX));
        assert_eq!(message.correlation_token, message.id);
        assert_eq!(message.kind, MessageKind::User);
    }
}
