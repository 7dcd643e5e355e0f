use serde::{Deserialize, Serialize};

/// Error body returned by the storage backend when it rejects a request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// The main error message
    pub message: String,
    /// Optional additional details about the error
    #[serde(default)]
    pub details: Option<String>,
    /// Backend-specific error code, e.g. a Postgres SQLSTATE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    /// Creates a new error response with just a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
            code: None,
        }
    }

    /// Interprets a raw response body. Bodies that are not a JSON error object
    /// become the message verbatim, and an empty body falls back to `fallback`.
    #[must_use]
    pub fn from_body(body: &str, fallback: &str) -> Self {
        if let Ok(parsed) = serde_json::from_str::<Self>(body) {
            return parsed;
        }
        let trimmed = body.trim();
        if trimmed.is_empty() {
            Self::new(fallback)
        } else {
            Self::new(trimmed)
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {}", self.message, details),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ErrorResponse {}
