//! # Pipeline Error Types

use thiserror::Error;

/// Substrings marking a failure as transient. Matched case-insensitively
/// against the error message.
const TRANSIENT_MARKERS: [&str; 3] = ["network", "timeout", "connection"];

/// Failure of a durable read or write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The request never produced a response
    #[error("{message}")]
    Transport { message: String },

    /// The backend answered with an application-level error
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },

    /// The response could not be decoded
    #[error("Invalid response body: {message}")]
    Decode { message: String },
}

impl StoreError {
    /// Create a new transport error
    #[must_use]
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new rejection error
    #[must_use]
    pub fn rejected<T: Into<String>>(status: u16, message: T) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Create a new decode error
    #[must_use]
    pub fn decode<T: Into<String>>(message: T) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Network, timeout and connection failures are assumed to be reflected
    /// elsewhere in the UI and are not surfaced as notifications.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        let message = self.to_string().to_lowercase();
        TRANSIENT_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
    }
}

/// Failure to establish or keep a realtime subscription.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    #[error("Failed to subscribe to channel {channel}: {message}")]
    Subscribe { channel: String, message: String },
}

impl RealtimeError {
    #[must_use]
    pub fn subscribe<C: Into<String>, M: Into<String>>(channel: C, message: M) -> Self {
        Self::Subscribe {
            channel: channel.into(),
            message: message.into(),
        }
    }
}
