//! Error types for the crawl loop.

use thiserror::Error;

use crawler_bulk::BulkError;
use crawler_checkpoint::CheckpointError;
use crawler_client::ClientError;
use crawler_fs::FsError;

/// Errors that can occur while crawling
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Checkpoint could not be read or persisted
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// File backend failure
    #[error("Backend error: {0}")]
    Fs(#[from] FsError),

    /// Bulk engine refused an operation
    #[error("Bulk error: {0}")]
    Bulk(#[from] BulkError),

    /// Document could not be built or sent
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// File content could not be extracted
    #[error("Extraction failed for {path}: {source}")]
    Extract {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Job control on a job that has never run
    #[error("No checkpoint for job {0}")]
    NoCheckpoint(String),
}

impl OrchestratorError {
    /// Backend errors are worth retrying later; everything else stops the job
    /// or is specific to one file.
    pub fn is_transient(&self) -> bool {
        matches!(self, OrchestratorError::Fs(_))
    }

    /// Errors that must stop the whole job.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Checkpoint(_) | OrchestratorError::Bulk(_)
        )
    }
}
