//! In-process backend with failure injection.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use serde_json::{Value, json};
use shared::models::{NewMessageRecord, StoredMessageRecord, Timestamp};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::trace;

use super::{MessageStore, RealtimeChannel, Subscription};
use crate::error::{RealtimeError, StoreError};

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<StoredMessageRecord>,
    next_id: u64,
    insert_attempts: usize,
    write_failures: VecDeque<StoreError>,
    read_failure: Option<StoreError>,
    subscribe_failure: Option<RealtimeError>,
    subscribers: HashMap<String, Vec<UnboundedSender<Value>>>,
    echo_prefix: Option<String>,
}

/// Storage and realtime backend living in memory.
///
/// Cloning shares the same state, so a test can keep one handle for
/// inspection while the pipeline owns another.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes every successful insert on `<prefix><room_id>`, the way a
    /// database change feed would.
    #[must_use]
    pub fn with_echo(self, prefix: impl Into<String>) -> Self {
        self.lock().echo_prefix = Some(prefix.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-update; keep serving.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Makes the next writes fail, one error per attempt, in order.
    pub fn fail_next_writes(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.lock().write_failures.extend(errors);
    }

    /// Makes every read fail until cleared with `None`.
    pub fn fail_reads(&self, error: Option<StoreError>) {
        self.lock().read_failure = error;
    }

    /// Makes the next subscription attempt fail.
    pub fn fail_next_subscribe(&self, error: RealtimeError) {
        self.lock().subscribe_failure = Some(error);
    }

    /// Number of write attempts seen, failed ones included.
    #[must_use]
    pub fn insert_attempts(&self) -> usize {
        self.lock().insert_attempts
    }

    /// Stores a row as if another client had written it.
    pub fn seed(&self, record: StoredMessageRecord) {
        self.lock().rows.push(record);
    }

    #[must_use]
    pub fn rows(&self) -> Vec<StoredMessageRecord> {
        self.lock().rows.clone()
    }

    /// Delivers a payload to every live subscriber of `channel` and returns
    /// how many received it.
    pub fn publish(&self, channel: &str, payload: Value) -> usize {
        Self::deliver(&mut self.lock(), channel, &payload)
    }

    /// Live subscribers of `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        let mut inner = self.lock();
        inner.subscribers.get_mut(channel).map_or(0, |senders| {
            senders.retain(|sender| !sender.is_closed());
            senders.len()
        })
    }

    fn deliver(inner: &mut Inner, channel: &str, payload: &Value) -> usize {
        let Some(senders) = inner.subscribers.get_mut(channel) else {
            return 0;
        };
        senders.retain(|sender| sender.send(payload.clone()).is_ok());
        senders.len()
    }
}

#[async_trait]
impl MessageStore for MemoryBackend {
    async fn insert(&self, record: &NewMessageRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.insert_attempts += 1;
        if let Some(error) = inner.write_failures.pop_front() {
            return Err(error);
        }

        inner.next_id += 1;
        let row = StoredMessageRecord {
            id: inner.next_id.to_string(),
            room_id: record.room_id.clone(),
            sender_user_id: record.sender_user_id.clone(),
            sender_agent_id: record.sender_agent_id.clone(),
            text: Some(record.text.clone()),
            created_at: Timestamp::now(),
            updated_at: None,
            correlation_token: Some(record.correlation_token.clone()),
        };
        trace!(room_id = %row.room_id, id = %row.id, "stored message");
        inner.rows.push(row);

        if let Some(prefix) = inner.echo_prefix.clone() {
            let payload = json!({
                "message": record.text,
                "correlationToken": record.correlation_token,
                "senderUserId": record.sender_user_id,
            });
            Self::deliver(&mut inner, &format!("{prefix}{}", record.room_id), &payload);
        }
        Ok(())
    }

    async fn select_all(&self, room_id: &str) -> Result<Vec<StoredMessageRecord>, StoreError> {
        let inner = self.lock();
        if let Some(error) = &inner.read_failure {
            return Err(error.clone());
        }
        let mut rows: Vec<_> = inner
            .rows
            .iter()
            .filter(|row| row.room_id == room_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.created_at);
        Ok(rows)
    }
}

#[async_trait]
impl RealtimeChannel for MemoryBackend {
    async fn subscribe(&self, channel: &str) -> Result<Subscription, RealtimeError> {
        let mut inner = self.lock();
        if let Some(error) = inner.subscribe_failure.take() {
            return Err(error);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        inner
            .subscribers
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(channel, rx, None))
    }
}
