//! Operations, requests and responses exchanged with the transport.

use std::fmt;

/// One unit of work destined for the document store.
///
/// The identity (`index`, `id`) is what a response item refers to; it is
/// used to relocate a failed operation inside the request it came from.
pub trait BulkOperation: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Target index / collection
    fn index(&self) -> &str;

    /// Target document id
    fn id(&self) -> &str;

    /// Whether this operation is the one `item` reports on.
    fn matches(&self, item: &BulkItemResponse) -> bool {
        self.id() == item.id && self.index() == item.index
    }
}

/// Ordered, append-only list of operations.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRequest<O> {
    operations: Vec<O>,
}

impl<O> Default for BulkRequest<O> {
    fn default() -> Self {
        Self {
            operations: Vec::new(),
        }
    }
}

impl<O: BulkOperation> BulkRequest<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, operation: O) {
        self.operations.push(operation);
    }

    /// Number of buffered operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[O] {
        &self.operations
    }

    /// Locate the operation a response item reports on.
    ///
    /// The item position is tried first, then a scan by identity.
    pub fn find(&self, item: &BulkItemResponse) -> Option<&O> {
        self.operations
            .get(item.position)
            .filter(|op| op.matches(item))
            .or_else(|| self.operations.iter().find(|op| op.matches(item)))
    }
}

impl<O: BulkOperation> FromIterator<O> for BulkRequest<O> {
    fn from_iter<I: IntoIterator<Item = O>>(iter: I) -> Self {
        Self {
            operations: iter.into_iter().collect(),
        }
    }
}

/// Why one operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    /// Structured error type reported by the store, when available
    pub code: Option<String>,

    /// Free-text reason
    pub message: String,

    /// HTTP-like status of the item
    pub status: Option<u16>,
}

impl BulkFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl fmt::Display for BulkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemResponse {
    /// Position of the operation in the request
    pub position: usize,
    pub index: String,
    pub id: String,
    pub failure: Option<BulkFailure>,
}

impl BulkItemResponse {
    pub fn success(position: usize, index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            position,
            index: index.into(),
            id: id.into(),
            failure: None,
        }
    }

    pub fn failed(
        position: usize,
        index: impl Into<String>,
        id: impl Into<String>,
        failure: BulkFailure,
    ) -> Self {
        Self {
            position,
            index: index.into(),
            id: id.into(),
            failure: Some(failure),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Result of executing one request. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    items: Vec<BulkItemResponse>,
}

impl BulkResponse {
    pub fn new(items: Vec<BulkItemResponse>) -> Self {
        Self { items }
    }

    /// True if at least one item failed.
    pub fn has_failures(&self) -> bool {
        self.items.iter().any(BulkItemResponse::is_failed)
    }

    pub fn items(&self) -> &[BulkItemResponse] {
        &self.items
    }

    pub fn failures(&self) -> impl Iterator<Item = &BulkItemResponse> {
        self.items.iter().filter(|i| i.is_failed())
    }

    /// Summary of failed items, one per line.
    pub fn failure_message(&self) -> String {
        self.failures()
            .filter_map(|item| {
                item.failure
                    .as_ref()
                    .map(|f| format!("[{}] {}/{}: {}", item.position, item.index, item.id, f))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::op;
    use super::*;

    #[test]
    fn test_request_is_ordered() {
        let mut request = BulkRequest::new();
        request.add(op("a"));
        request.add(op("b"));
        assert_eq!(request.len(), 2);
        assert_eq!(request.operations(), &[op("a"), op("b")]);
    }

    #[test]
    fn test_find_by_position_then_identity() {
        let request: BulkRequest<_> = ["a", "b", "c"].into_iter().map(op).collect();

        let item = BulkItemResponse::success(1, "docs", "b");
        assert_eq!(request.find(&item), Some(&op("b")));

        // Wrong position still resolves by identity
        let item = BulkItemResponse::success(0, "docs", "c");
        assert_eq!(request.find(&item), Some(&op("c")));

        let item = BulkItemResponse::success(0, "other", "a");
        assert_eq!(request.find(&item), None);
    }

    #[test]
    fn test_response_failures() {
        let response = BulkResponse::new(vec![
            BulkItemResponse::success(0, "docs", "a"),
            BulkItemResponse::failed(
                1,
                "docs",
                "b",
                BulkFailure::new("mapper_parsing").with_code("mapper_parsing_exception"),
            ),
        ]);
        assert!(response.has_failures());
        assert_eq!(response.failures().count(), 1);
        assert_eq!(
            response.failure_message(),
            "[1] docs/b: [mapper_parsing_exception] mapper_parsing"
        );

        assert!(!BulkResponse::default().has_failures());
    }
}
