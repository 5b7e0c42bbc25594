//! Transport seam between the engine and the document store.

use async_trait::async_trait;

use crate::error::BulkError;
use crate::operation::{BulkOperation, BulkRequest, BulkResponse};

/// Executes a bulk request against the document store.
///
/// Implementations own the wire format. Returning `Err` means the whole
/// request failed; per-operation failures are reported inside the
/// [`BulkResponse`].
#[async_trait]
pub trait BulkTransport<O: BulkOperation>: Send + Sync {
    async fn bulk(&self, request: &BulkRequest<O>) -> Result<BulkResponse, BulkError>;
}
