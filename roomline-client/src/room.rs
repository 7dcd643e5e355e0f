//! One room's message state and the producers feeding it.

use std::{collections::HashSet, sync::Arc};

use shared::{
    config::client::Config,
    models::{Message, MessageGroup},
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    backend::{MessageStore, RealtimeChannel},
    collection::MessageCollection,
    error::{RealtimeError, StoreError},
    factory::{LocalMessageDraft, build_local_message},
    fetcher::MessageFetcher,
    gateway::MessageGateway,
    listener::{ListenerHandle, RealtimeListener},
    notify::Notifier,
    reconcile::{reconcile, render},
};

/// Owns the optimistic, fetched and realtime collections of a room. Only the
/// session's producers write to them; views read through
/// [`messages`](Self::messages) and [`groups`](Self::groups).
#[derive(Debug)]
pub struct RoomSession {
    room_id: String,
    user_id: Option<String>,
    gateway: Arc<MessageGateway>,
    fetcher: MessageFetcher,
    listener: RealtimeListener,
    optimistic: MessageCollection,
    fetched: MessageCollection,
    realtime: MessageCollection,
    realtime_handle: Option<ListenerHandle>,
}

impl RoomSession {
    /// `user_id` is the signed-in user credited with messages posted here.
    #[must_use]
    pub fn new(
        room_id: impl Into<String>,
        user_id: Option<String>,
        store: Arc<dyn MessageStore>,
        channel: Arc<dyn RealtimeChannel>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        let gateway =
            MessageGateway::new(store.clone(), notifier.clone()).with_retry(config.retry.clone());
        Self {
            room_id: room_id.into(),
            user_id,
            gateway: Arc::new(gateway),
            fetcher: MessageFetcher::new(store, notifier),
            listener: RealtimeListener::from_config(channel, config),
            optimistic: MessageCollection::new(),
            fetched: MessageCollection::new(),
            realtime: MessageCollection::new(),
            realtime_handle: None,
        }
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Realtime channel this room listens on.
    #[must_use]
    pub fn channel(&self) -> String {
        self.listener.channel_name(&self.room_id)
    }

    /// True while a post is being written, retries included.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.gateway.is_processing()
    }

    /// Replaces the fetched history and drops optimistic entries whose
    /// durable copy it now contains. Returns the number of fetched messages.
    ///
    /// # Errors
    /// Returns the read failure; the previous history is kept.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let history = self.fetcher.fetch(Some(&self.room_id)).await?;
        let count = history.len();
        let durable: HashSet<String> = history
            .iter()
            .map(|message| message.correlation_token.clone())
            .collect();

        self.fetched.replace(history);
        self.optimistic.retain(|message| {
            !(message.is_confirmed() && durable.contains(&message.correlation_token))
        });
        debug!(room_id = %self.room_id, count, "room history loaded");
        Ok(count)
    }

    /// Shows `text` immediately as a pending message and persists it.
    ///
    /// Returns the optimistic entry after the write settled, or `None` for a
    /// blank room or text. On success the entry is confirmed.
    ///
    /// # Errors
    /// On terminal write failure the entry stays visible marked failed, and
    /// the error is returned.
    pub async fn post(&self, text: &str) -> Result<Option<Message>, StoreError> {
        if self.room_id.trim().is_empty() || text.trim().is_empty() {
            return Ok(None);
        }
        let draft =
            LocalMessageDraft::new(self.room_id.clone(), text).sent_by(self.user_id.clone());
        let message = build_local_message(draft);
        let token = message.correlation_token.clone();
        self.optimistic.append(message);

        self.deliver(&token, text).await
    }

    /// Re-sends a failed entry under its original token. Returns `None` when
    /// no failed entry carries the token.
    ///
    /// # Errors
    /// Returns the write failure; the entry is marked failed again.
    pub async fn retry(&self, correlation_token: &str) -> Result<Option<Message>, StoreError> {
        let Some(entry) = self
            .optimistic
            .find_by_token(correlation_token)
            .filter(|message| message.failed)
        else {
            return Ok(None);
        };

        self.optimistic.update_by_token(correlation_token, |message| {
            message.failed = false;
            message.pending = true;
        });
        self.deliver(correlation_token, entry.body()).await
    }

    async fn deliver(&self, token: &str, text: &str) -> Result<Option<Message>, StoreError> {
        let result = self
            .gateway
            .send_with_token(
                Some(&self.room_id),
                text,
                self.user_id.as_deref(),
                token.to_string(),
            )
            .await;

        match result {
            Ok(Some(_)) => {
                self.optimistic.update_by_token(token, |message| {
                    message.pending = false;
                    message.failed = false;
                });
                Ok(self.optimistic.find_by_token(token))
            }
            // The gateway declined to write; nothing may look persisted.
            Ok(None) => {
                self.optimistic
                    .retain(|message| message.correlation_token != token);
                Ok(None)
            }
            Err(err) => {
                self.optimistic.update_by_token(token, |message| {
                    message.pending = false;
                    message.failed = true;
                });
                Err(err)
            }
        }
    }

    /// Starts appending realtime deliveries. A no-op while a listener is
    /// already active.
    ///
    /// # Errors
    /// Returns an error if the channel subscription fails.
    pub async fn attach_realtime(&mut self) -> Result<(), RealtimeError> {
        if self
            .realtime_handle
            .as_ref()
            .is_some_and(ListenerHandle::is_active)
        {
            return Ok(());
        }
        let handle = self
            .listener
            .attach(&self.room_id, self.realtime.clone())
            .await?;
        self.realtime_handle = Some(handle);
        Ok(())
    }

    /// Stops the realtime listener. Deliveries arriving afterwards are ignored.
    pub async fn detach_realtime(&mut self) {
        if let Some(handle) = self.realtime_handle.take() {
            handle.detach().await;
            info!(room_id = %self.room_id, "room realtime detached");
        }
    }

    /// Receiver woken whenever a realtime delivery is appended.
    #[must_use]
    pub fn watch_realtime(&self) -> watch::Receiver<Arc<Vec<Message>>> {
        self.realtime.subscribe()
    }

    /// Deduplicated messages in display order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        reconcile(
            &self.optimistic.snapshot(),
            &self.fetched.snapshot(),
            &self.realtime.snapshot(),
        )
    }

    /// [`messages`](Self::messages) grouped by sender.
    #[must_use]
    pub fn groups(&self) -> Vec<MessageGroup> {
        render(
            &self.optimistic.snapshot(),
            &self.fetched.snapshot(),
            &self.realtime.snapshot(),
        )
    }
}
