//! Remote API error types.

use thiserror::Error;

/// A failed network read or write against the remote API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Request never produced a response (DNS, refused connection, timeout).
    #[error("Network error: {0}")]
    Transport(String),

    /// Server answered with a non-success status.
    #[error("Server returned status {status} for {path}")]
    Status { status: u16, path: String },

    /// Response body was not the JSON we expected.
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the same request might succeed later without changes.
    ///
    /// Only informational: every failed item is retried on the next drain.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            ApiError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}
