//! Error types shared by the crawler crates.

use thiserror::Error;

/// Unified error type for configuration and domain-type operations.
#[derive(Debug, Error)]
pub enum CrawlerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
