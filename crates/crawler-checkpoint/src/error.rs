//! Error types for checkpoint persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing checkpoints
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Filesystem operation failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A checkpoint file exists but cannot be decoded
    #[error("Unreadable checkpoint {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    /// JSON encoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Job name cannot be used as a directory name
    #[error("Invalid job name: {0}")]
    InvalidJobName(String),
}

impl CheckpointError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CheckpointError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when a checkpoint file exists but is corrupt.
    pub fn is_unreadable(&self) -> bool {
        matches!(self, CheckpointError::Unreadable { .. })
    }
}

impl From<serde_json::Error> for CheckpointError {
    fn from(err: serde_json::Error) -> Self {
        CheckpointError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CheckpointError::Unreadable {
            path: PathBuf::from("/cfg/docs/_checkpoint.json"),
            reason: "EOF while parsing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unreadable checkpoint /cfg/docs/_checkpoint.json: EOF while parsing"
        );
        assert!(err.is_unreadable());

        let err = CheckpointError::InvalidJobName("../etc".to_string());
        assert_eq!(err.to_string(), "Invalid job name: ../etc");
        assert!(!err.is_unreadable());
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: CheckpointError = json_err.into();
        assert!(matches!(err, CheckpointError::Serialization(_)));
    }
}
