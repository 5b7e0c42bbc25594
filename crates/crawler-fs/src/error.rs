//! Error types for file backends.

use thiserror::Error;

/// Errors that can occur while talking to a file backend
#[derive(Debug, Error)]
pub enum FsError {
    /// Operation attempted before `open()` succeeded
    #[error("Backend is not connected")]
    NotConnected,

    /// The configured crawl root does not exist or is not a directory
    #[error("Root directory not found: {0}")]
    RootNotFound(String),

    /// I/O failure on a specific path
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Backend-specific failure (handshake, authentication, protocol)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Include/exclude pattern could not be compiled
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl FsError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        FsError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(FsError::NotConnected.to_string(), "Backend is not connected");

        let err = FsError::io(
            "/data/a.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "I/O error on /data/a.txt: denied");

        let err = FsError::InvalidPattern {
            pattern: "[".to_string(),
            reason: "unclosed class".to_string(),
        };
        assert!(err.to_string().contains("'['"));
    }
}
