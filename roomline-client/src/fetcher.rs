//! Loads a room's persisted history.

use std::sync::Arc;

use shared::models::{Message, MessageKind, StoredMessageRecord};
use tracing::{debug, error};

use crate::{
    backend::MessageStore,
    error::StoreError,
    notify::{Notification, Notifier},
};

/// Prefix for tokens synthesized from durable identifiers.
pub const DURABLE_PREFIX: &str = "db-";

#[derive(Clone)]
pub struct MessageFetcher {
    store: Arc<dyn MessageStore>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for MessageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageFetcher").finish_non_exhaustive()
    }
}

impl MessageFetcher {
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Every message of the room, oldest first. A missing room yields an
    /// empty history.
    ///
    /// # Errors
    /// Any read failure is notified to the user and returned; no partial
    /// history is produced.
    pub async fn fetch(&self, room_id: Option<&str>) -> Result<Vec<Message>, StoreError> {
        let Some(room_id) = room_id.filter(|id| !id.is_empty()) else {
            return Ok(Vec::new());
        };

        match self.store.select_all(room_id).await {
            Ok(records) => {
                debug!(room_id, count = records.len(), "fetched room history");
                Ok(records.into_iter().map(normalize).collect())
            }
            Err(err) => {
                error!(room_id, error = %err, "failed to fetch room history");
                self.notifier
                    .notify(Notification::error("Could not load messages", err.to_string()));
                Err(err)
            }
        }
    }
}

/// Converts a stored row into a confirmed message.
#[must_use]
pub fn normalize(record: StoredMessageRecord) -> Message {
    let correlation_token = record
        .correlation_token
        .unwrap_or_else(|| format!("{DURABLE_PREFIX}{}", record.id));
    let kind = MessageKind::from_sender(record.sender_user_id.as_ref());

    Message {
        id: record.id,
        room_id: record.room_id,
        sender_user_id: record.sender_user_id,
        sender_agent_id: record.sender_agent_id,
        text: record.text,
        created_at: record.created_at,
        updated_at: record.updated_at,
        correlation_token,
        pending: false,
        failed: false,
        kind,
    }
}
