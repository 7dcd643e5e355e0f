//! Durable writes with bounded retry.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use metrics::counter;
use shared::{config::client::RetryConfig, models::NewMessageRecord};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    backend::MessageStore,
    error::StoreError,
    notify::{Notification, Notifier},
};

/// Sends messages to durable storage, retrying failed writes with a linear
/// backoff. A call runs to success or exhaustion; it cannot be cancelled.
pub struct MessageGateway {
    store: Arc<dyn MessageStore>,
    notifier: Arc<dyn Notifier>,
    retry: RetryConfig,
    in_flight: AtomicUsize,
}

impl std::fmt::Debug for MessageGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageGateway")
            .field("retry", &self.retry)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

/// Clears the processing flag on every exit path.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MessageGateway {
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            retry: RetryConfig::default(),
            in_flight: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// True while any send, retries included, is in progress. Input controls
    /// use it to block duplicate submission.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Persists `text` in `room_id` under a freshly generated correlation token.
    ///
    /// Returns `Ok(None)` without writing when the room is missing or the
    /// text is blank, and `Ok(Some(token))` once the write succeeded.
    ///
    /// # Errors
    /// Returns the last failure once every attempt has failed.
    pub async fn send(
        &self,
        room_id: Option<&str>,
        text: &str,
        sender_user_id: Option<&str>,
    ) -> Result<Option<String>, StoreError> {
        let token = Uuid::new_v4().to_string();
        self.send_with_token(room_id, text, sender_user_id, token)
            .await
    }

    /// Like [`send`](Self::send), but persists under the caller's token so an
    /// optimistic entry and its durable copy share one token.
    ///
    /// # Errors
    /// Returns the last failure once every attempt has failed.
    pub async fn send_with_token(
        &self,
        room_id: Option<&str>,
        text: &str,
        sender_user_id: Option<&str>,
        correlation_token: String,
    ) -> Result<Option<String>, StoreError> {
        let Some(room_id) = room_id.filter(|id| !id.trim().is_empty()) else {
            return Ok(None);
        };
        if text.trim().is_empty() {
            return Ok(None);
        }

        let record = NewMessageRecord {
            room_id: room_id.to_string(),
            text: text.to_string(),
            correlation_token,
            sender_user_id: sender_user_id.map(str::to_string),
            sender_agent_id: None,
        };

        let _processing = InFlight::enter(&self.in_flight);
        self.write_with_retry(&record).await?;
        Ok(Some(record.correlation_token))
    }

    async fn write_with_retry(&self, record: &NewMessageRecord) -> Result<(), StoreError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            counter!("roomline_send_attempts_total").increment(1);

            let Err(err) = self.store.insert(record).await else {
                debug!(
                    room_id = %record.room_id,
                    correlation_token = %record.correlation_token,
                    attempt,
                    "message persisted"
                );
                return Ok(());
            };
            counter!("roomline_send_failures_total").increment(1);

            if attempt >= max_attempts {
                error!(
                    room_id = %record.room_id,
                    correlation_token = %record.correlation_token,
                    attempts = attempt,
                    error = %err,
                    "giving up on message write"
                );
                if !err.is_transient() {
                    self.notifier
                        .notify(Notification::error("Message not sent", err.to_string()));
                }
                return Err(err);
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "message write failed; retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
