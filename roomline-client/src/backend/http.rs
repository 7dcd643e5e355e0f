//! REST + server-sent-events backend over reqwest.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use shared::{
    config::client::Config,
    models::{ErrorResponse, NewMessageRecord, StoredMessageRecord},
};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::{MessageStore, RealtimeChannel, Subscription};
use crate::error::{RealtimeError, StoreError};

const MESSAGES_PATH: &str = "rest/v1/messages";
const CHANNELS_PATH: &str = "realtime/v1/channels";

/// Talks to the hosted backend: rows under `rest/v1/messages`, realtime
/// events as an SSE stream under `realtime/v1/channels/<channel>`.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpBackend {
    /// Create a new backend client with the provided base URL.
    #[must_use]
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    /// # Errors
    /// Returns an error if the configured backend URL does not parse.
    pub fn from_config(config: &Config) -> Result<Self, url::ParseError> {
        let url = config.backend_url()?;
        Ok(Self::new(url.as_str(), config.api_key.clone()))
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    fn channel_url(&self, channel: &str) -> Result<Url, RealtimeError> {
        let mut url = Url::parse(&self.api_url(CHANNELS_PATH))
            .map_err(|err| RealtimeError::subscribe(channel, err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| RealtimeError::subscribe(channel, "backend URL cannot be a base"))?
            .push(channel);
        Ok(url)
    }
}

/// Phrases connect, timeout and send failures so the transient classifier
/// recognizes them. Other failures keep reqwest's own wording.
fn transport_error(err: &reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::transport(format!("request timeout: {err}"))
    } else if err.is_connect() {
        StoreError::transport(format!("connection failed: {err}"))
    } else if err.is_request() {
        StoreError::transport(format!("network error: {err}"))
    } else if err.is_decode() {
        StoreError::decode(err.to_string())
    } else {
        StoreError::transport(err.to_string())
    }
}

async fn rejection(response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let fallback = status
        .canonical_reason()
        .unwrap_or("request rejected")
        .to_string();
    let error = ErrorResponse::from_body(&body, &fallback);
    StoreError::rejected(status.as_u16(), error.to_string())
}

#[async_trait]
impl MessageStore for HttpBackend {
    async fn insert(&self, record: &NewMessageRecord) -> Result<(), StoreError> {
        let response = self
            .authorize(self.client.post(self.api_url(MESSAGES_PATH)))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await
            .map_err(|err| transport_error(&err))?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }

    async fn select_all(&self, room_id: &str) -> Result<Vec<StoredMessageRecord>, StoreError> {
        let room_filter = format!("eq.{room_id}");
        let response = self
            .authorize(self.client.get(self.api_url(MESSAGES_PATH)))
            .query(&[("roomId", room_filter.as_str()), ("order", "createdAt.asc")])
            .send()
            .await
            .map_err(|err| transport_error(&err))?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        response
            .json::<Vec<StoredMessageRecord>>()
            .await
            .map_err(|err| StoreError::decode(err.to_string()))
    }
}

#[async_trait]
impl RealtimeChannel for HttpBackend {
    async fn subscribe(&self, channel: &str) -> Result<Subscription, RealtimeError> {
        let url = self.channel_url(channel)?;
        let response = self
            .authorize(self.client.get(url))
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|err| RealtimeError::subscribe(channel, err.to_string()))?;

        if !response.status().is_success() {
            return Err(RealtimeError::subscribe(
                channel,
                format!("stream rejected with status {}", response.status()),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let release = CancellationToken::new();
        tokio::spawn(pump_events(
            channel.to_string(),
            response,
            tx,
            release.child_token(),
        ));
        debug!(channel, "realtime stream opened");
        Ok(Subscription::new(channel, rx, Some(release)))
    }
}

/// Reads the SSE body and forwards each event's data until the stream ends,
/// the subscriber goes away, or the subscription is released.
async fn pump_events(
    channel: String,
    response: Response,
    tx: UnboundedSender<Value>,
    stop: CancellationToken,
) {
    let mut stream = response.bytes_stream();
    let mut parser = SseParser::default();

    loop {
        let chunk = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            chunk = stream.next() => chunk,
        };
        let bytes = match chunk {
            Some(Ok(bytes)) => bytes,
            Some(Err(err)) => {
                warn!(channel = %channel, error = %err, "realtime stream chunk error");
                break;
            }
            None => break,
        };

        for data in parser.feed(&bytes) {
            // Non-JSON data still goes through; the listener decides what is malformed.
            let payload = serde_json::from_str(&data).unwrap_or(Value::String(data));
            if tx.send(payload).is_err() {
                return;
            }
        }
    }
    debug!(channel = %channel, "realtime stream closed");
}

/// Incremental `text/event-stream` parser yielding the `data` of each event.
///
/// Bytes are buffered until a full line arrives, so a UTF-8 sequence split
/// across chunks is decoded intact.
#[derive(Debug, Default)]
struct SseParser {
    pending: Vec<u8>,
    data: String,
}

impl SseParser {
    fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut events = Vec::new();
        self.pending.extend_from_slice(chunk);

        while let Some(newline) = self.pending.iter().position(|&byte| byte == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let trimmed = line.trim_end_matches(['\n', '\r']);

            if trimmed.is_empty() {
                if !self.data.is_empty() && self.data != "[DONE]" {
                    events.push(std::mem::take(&mut self.data));
                }
                self.data.clear();
            } else if let Some(value) = trimmed.strip_prefix("data:") {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(value.trim_start());
            }
            // `event:`, `id:`, `retry:` and comments carry nothing we use.
        }
        events
    }
}
