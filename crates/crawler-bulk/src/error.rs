//! Error types for the bulk engine.

use thiserror::Error;

/// Errors that can occur during bulk operations.
#[derive(Debug, Clone, Error)]
pub enum BulkError {
    /// The processor was closed; no more operations are accepted
    #[error("Bulk processor is closed")]
    Closed,

    /// The transport failed to execute the whole request
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport returned something it could not decode
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
