//! Operations the crawler sends to the document store.

use serde::Serialize;

use crawler_bulk::BulkOperation;

use crate::error::ClientError;

/// One index-or-delete unit.
#[derive(Debug, Clone, PartialEq)]
pub enum DocOperation {
    /// Create or replace the document `id` with `source`
    Index {
        index: String,
        id: String,
        source: serde_json::Value,
    },
    /// Remove the document `id`
    Delete { index: String, id: String },
}

impl DocOperation {
    /// Build an index operation from any serializable document.
    pub fn index<T: Serialize>(
        index: impl Into<String>,
        id: impl Into<String>,
        doc: &T,
    ) -> Result<Self, ClientError> {
        Ok(DocOperation::Index {
            index: index.into(),
            id: id.into(),
            source: serde_json::to_value(doc)?,
        })
    }

    pub fn delete(index: impl Into<String>, id: impl Into<String>) -> Self {
        DocOperation::Delete {
            index: index.into(),
            id: id.into(),
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, DocOperation::Delete { .. })
    }

    /// Action name in the `_bulk` protocol.
    pub fn action(&self) -> &'static str {
        match self {
            DocOperation::Index { .. } => "index",
            DocOperation::Delete { .. } => "delete",
        }
    }
}

impl BulkOperation for DocOperation {
    fn index(&self) -> &str {
        match self {
            DocOperation::Index { index, .. } | DocOperation::Delete { index, .. } => index,
        }
    }

    fn id(&self) -> &str {
        match self {
            DocOperation::Index { id, .. } | DocOperation::Delete { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawler_bulk::BulkItemResponse;
    use serde_json::json;

    #[test]
    fn test_index_operation_from_document() {
        #[derive(Serialize)]
        struct Doc {
            title: &'static str,
        }

        let op = DocOperation::index("docs", "1", &Doc { title: "hello" }).unwrap();
        assert_eq!(op.action(), "index");
        assert_eq!(BulkOperation::index(&op), "docs");
        assert_eq!(op.id(), "1");
        match op {
            DocOperation::Index { source, .. } => assert_eq!(source, json!({"title": "hello"})),
            DocOperation::Delete { .. } => panic!("expected index operation"),
        }
    }

    #[test]
    fn test_delete_matches_item() {
        let op = DocOperation::delete("docs", "abc");
        assert!(op.is_delete());
        assert!(op.matches(&BulkItemResponse::success(3, "docs", "abc")));
        assert!(!op.matches(&BulkItemResponse::success(3, "docs_folder", "abc")));
    }
}
