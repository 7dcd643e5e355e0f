//! Appends realtime deliveries to a room's message collection.

use std::sync::Arc;

use serde_json::Value;
use shared::{
    config::client::Config,
    models::{Message, MessageKind, RealtimePayload, Timestamp},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    backend::{RealtimeChannel, Subscription},
    collection::MessageCollection,
    error::RealtimeError,
};

/// Prefix for identifiers minted for realtime deliveries.
pub const DELIVERY_PREFIX: &str = "rt-";

#[derive(Clone)]
pub struct RealtimeListener {
    channel: Arc<dyn RealtimeChannel>,
    channel_prefix: String,
    agent_id: Option<String>,
}

impl std::fmt::Debug for RealtimeListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeListener")
            .field("channel_prefix", &self.channel_prefix)
            .field("agent_id", &self.agent_id)
            .finish_non_exhaustive()
    }
}

impl RealtimeListener {
    /// `agent_id` is credited with deliveries that name no sender.
    #[must_use]
    pub fn new(
        channel: Arc<dyn RealtimeChannel>,
        channel_prefix: impl Into<String>,
        agent_id: Option<String>,
    ) -> Self {
        Self {
            channel,
            channel_prefix: channel_prefix.into(),
            agent_id,
        }
    }

    #[must_use]
    pub fn from_config(channel: Arc<dyn RealtimeChannel>, config: &Config) -> Self {
        Self::new(channel, config.channel_prefix.clone(), config.agent_id.clone())
    }

    #[must_use]
    pub fn channel_name(&self, room_id: &str) -> String {
        format!("{}{}", self.channel_prefix, room_id)
    }

    /// Subscribes to the room's channel and appends every well-formed
    /// delivery to `collection` until the returned handle is detached or
    /// dropped.
    ///
    /// # Errors
    /// Returns an error if the subscription cannot be established.
    pub async fn attach(
        &self,
        room_id: &str,
        collection: MessageCollection,
    ) -> Result<ListenerHandle, RealtimeError> {
        let channel = self.channel_name(room_id);
        let subscription = self.channel.subscribe(&channel).await?;
        info!(channel = %channel, "realtime listener attached");

        let stop = CancellationToken::new();
        let task = tokio::spawn(run(
            subscription,
            collection,
            stop.clone(),
            room_id.to_string(),
            self.agent_id.clone(),
        ));

        Ok(ListenerHandle {
            channel,
            stop,
            task: Some(task),
        })
    }
}

/// Scoped ownership of a running listener. Dropping the handle stops it;
/// [`detach`](Self::detach) also waits until the subscription is released.
#[derive(Debug)]
pub struct ListenerHandle {
    channel: String,
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// False once the channel closed or the listener was stopped.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.stop.is_cancelled() && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the listener. No delivery is applied once this returns.
    pub async fn detach(mut self) {
        self.stop.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!(channel = %self.channel, "realtime listener detached");
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn run(
    mut subscription: Subscription,
    collection: MessageCollection,
    stop: CancellationToken,
    room_id: String,
    agent_id: Option<String>,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            event = subscription.next_event() => event,
        };
        let Some(raw) = event else {
            debug!(channel = %subscription.channel(), "realtime channel closed");
            break;
        };
        if stop.is_cancelled() {
            break;
        }
        match message_from_event(&room_id, agent_id.as_deref(), raw) {
            Some(message) => collection.append(message),
            None => debug!(channel = %subscription.channel(), "dropping malformed realtime payload"),
        }
    }
    subscription.unsubscribe();
}

/// Builds a confirmed message from a raw delivery, or `None` when the payload
/// is not an object carrying a `message` string.
#[must_use]
pub fn message_from_event(room_id: &str, agent_id: Option<&str>, raw: Value) -> Option<Message> {
    if !raw.is_object() {
        return None;
    }
    let payload: RealtimePayload = serde_json::from_value(raw).ok()?;

    let id = format!("{DELIVERY_PREFIX}{}", Uuid::new_v4());
    let sender_agent_id = if payload.sender_user_id.is_some() {
        payload.sender_agent_id
    } else {
        payload
            .sender_agent_id
            .or_else(|| agent_id.map(str::to_string))
    };

    Some(Message {
        correlation_token: payload.correlation_token.unwrap_or_else(|| id.clone()),
        id,
        room_id: room_id.to_string(),
        kind: MessageKind::from_sender(payload.sender_user_id.as_ref()),
        sender_user_id: payload.sender_user_id,
        sender_agent_id,
        text: Some(payload.message),
        created_at: Timestamp::now(),
        updated_at: None,
        pending: false,
        failed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;
    use std::time::Duration;

    fn listener(backend: &MemoryBackend) -> RealtimeListener {
        RealtimeListener::new(Arc::new(backend.clone()), "room:", Some("agent-1".into()))
    }

    async fn wait_for_len(collection: &MessageCollection, len: usize) {
        let mut rx = collection.subscribe();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|list| list.len() >= len))
            .await
            .expect("collection did not grow in time")
            .expect("collection closed");
    }

    #[test]
    fn builds_agent_message_by_default() {
        let message = message_from_event("r", Some("agent-1"), json!({"message": "hello"})).unwrap();

        assert!(message.id.starts_with(DELIVERY_PREFIX));
        assert_eq!(message.correlation_token, message.id);
        assert_eq!(message.sender_user_id, None);
        assert_eq!(message.sender_agent_id.as_deref(), Some("agent-1"));
        assert_eq!(message.kind, MessageKind::Agent);
        assert!(!message.pending);
    }

    #[test]
    fn payload_senders_override_defaults() {
        let message = message_from_event(
            "r",
            Some("agent-1"),
            json!({"message": "hi", "correlationToken": "local-1", "senderUserId": "user-1"}),
        )
        .unwrap();

        assert_eq!(message.correlation_token, "local-1");
        assert_eq!(message.sender_user_id.as_deref(), Some("user-1"));
        assert_eq!(message.sender_agent_id, None);
        assert_eq!(message.kind, MessageKind::User);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(message_from_event("r", None, json!("hello")).is_none());
        assert!(message_from_event("r", None, json!(["hello"])).is_none());
        assert!(message_from_event("r", None, json!({"text": "hello"})).is_none());
        assert!(message_from_event("r", None, json!({"message": 5})).is_none());
    }

    #[tokio::test]
    async fn appends_deliveries_preserving_existing_entries() {
        let backend = MemoryBackend::new();
        let collection = MessageCollection::new();
        let handle = listener(&backend)
            .attach("room-1", collection.clone())
            .await
            .unwrap();
        assert_eq!(handle.channel(), "room:room-1");

        backend.publish("room:room-1", json!({"message": "one"}));
        backend.publish("room:room-1", json!("garbage"));
        backend.publish("room:room-1", json!({"message": "two"}));
        wait_for_len(&collection, 2).await;

        let snapshot = collection.snapshot();
        assert_eq!(snapshot[0].body(), "one");
        assert_eq!(snapshot[1].body(), "two");

        handle.detach().await;
    }

    #[tokio::test]
    async fn nothing_is_applied_after_detach() {
        let backend = MemoryBackend::new();
        let collection = MessageCollection::new();
        let handle = listener(&backend)
            .attach("room-1", collection.clone())
            .await
            .unwrap();

        handle.detach().await;
        let delivered = backend.publish("room:room-1", json!({"message": "late"}));
        tokio::task::yield_now().await;

        assert_eq!(delivered, 0);
        assert!(collection.snapshot().is_empty());
        assert_eq!(backend.subscriber_count("room:room-1"), 0);
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_the_listener() {
        let backend = MemoryBackend::new();
        let collection = MessageCollection::new();
        let handle = listener(&backend)
            .attach("room-1", collection.clone())
            .await
            .unwrap();
        drop(handle);

        tokio::time::sleep(Duration::from_millis(20)).await;
        backend.publish("room:room-1", json!({"message": "late"}));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(collection.snapshot().is_empty());
        assert_eq!(backend.subscriber_count("room:room-1"), 0);
    }

    #[tokio::test]
    async fn subscribe_failure_is_returned() {
        let backend = MemoryBackend::new();
        backend.fail_next_subscribe(RealtimeError::subscribe("room:room-1", "refused"));

        let result = listener(&backend)
            .attach("room-1", MessageCollection::new())
            .await;

        assert!(matches!(result, Err(RealtimeError::Subscribe { .. })));
        assert_eq!(backend.subscriber_count("room:room-1"), 0);
    }
}
