//! Error types for document-store requests.

use thiserror::Error;

use crawler_bulk::BulkError;

/// Errors that can occur while talking to the document store
#[derive(Debug, Error)]
pub enum ClientError {
    /// Client could not be built from settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request never got a response (connection refused, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

impl From<ClientError> for BulkError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Parse(msg) => BulkError::InvalidResponse(msg),
            other => BulkError::Transport(other.to_string()),
        }
    }
}
