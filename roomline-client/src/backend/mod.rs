//! Seams to the external storage and realtime services.
//!
//! Every pipeline stage receives its backend explicitly, so the same code runs
//! against [`http::HttpBackend`] in production and [`memory::MemoryBackend`]
//! in tests.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use shared::models::{NewMessageRecord, StoredMessageRecord};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::{RealtimeError, StoreError};

pub use http::HttpBackend;
pub use memory::MemoryBackend;

/// Durable message storage.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists one message.
    async fn insert(&self, record: &NewMessageRecord) -> Result<(), StoreError>;

    /// Loads every message of a room ordered by creation time, oldest first.
    async fn select_all(&self, room_id: &str) -> Result<Vec<StoredMessageRecord>, StoreError>;
}

/// Publish/subscribe transport for room events.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Opens a subscription on a named channel.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, RealtimeError>;
}

/// A live channel subscription. Dropping it releases the channel.
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    events: UnboundedReceiver<Value>,
    _release: Option<DropGuard>,
}

impl Subscription {
    /// `release` is cancelled when the subscription goes away, which lets the
    /// transport stop its background reader.
    #[must_use]
    pub fn new(
        channel: impl Into<String>,
        events: UnboundedReceiver<Value>,
        release: Option<CancellationToken>,
    ) -> Self {
        Self {
            channel: channel.into(),
            events,
            _release: release.map(CancellationToken::drop_guard),
        }
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next raw event payload, or `None` once the channel has closed.
    pub async fn next_event(&mut self) -> Option<Value> {
        self.events.recv().await
    }

    /// Releases the channel.
    pub fn unsubscribe(mut self) {
        self.events.close();
    }
}
