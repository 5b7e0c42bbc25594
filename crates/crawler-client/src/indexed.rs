//! What the store already holds for a directory.

use async_trait::async_trait;

use crate::error::ClientError;

/// A document found in the store under some parent directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDoc {
    pub id: String,
    /// Last path component
    pub name: String,
    pub virtual_path: String,
}

/// Lookup of indexed children, used to remove files deleted since the last scan.
#[async_trait]
pub trait IndexedDocuments: Send + Sync {
    /// Documents in `index` whose parent virtual path is `parent`.
    async fn children(&self, index: &str, parent: &str) -> Result<Vec<IndexedDoc>, ClientError>;
}
