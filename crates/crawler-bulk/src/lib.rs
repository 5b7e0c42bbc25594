//! Bulk-ingestion engine for the document crawler.
//!
//! The engine accumulates operations into a request and hands full
//! requests to a caller-supplied transport. It knows nothing about the
//! wire protocol of the document store.
//!
//! # Features
//!
//! - Size-triggered flush once `bulk_actions` operations are buffered
//! - Optional background flush timer, stopped via `CancellationToken`
//! - Swap-then-hand-off: producers keep adding while a flush is in flight
//! - Listener chain: logging, successive-error counting, retry of
//!   individually failed operations
//!
//! # Example
//!
//! ```ignore
//! use crawler_bulk::{BulkProcessor, BulkProcessorConfig, default_listener};
//!
//! let config = BulkProcessorConfig::default()
//!     .with_bulk_actions(100)
//!     .with_flush_interval(Duration::from_secs(5));
//! let processor = BulkProcessor::new(
//!     config,
//!     transport,
//!     default_listener(vec!["es_rejected_execution_exception".into()]),
//! );
//!
//! processor.add(operation).await?;
//! processor.close().await;
//! ```

mod error;
mod listener;
mod operation;
mod processor;
mod transport;

pub use error::BulkError;
pub use listener::{
    default_listener, BulkListener, ErrorCountingListener, LoggingListener, RetryListener,
    RetryPolicy,
};
pub use operation::{BulkFailure, BulkItemResponse, BulkOperation, BulkRequest, BulkResponse};
pub use processor::{BulkProcessor, BulkProcessorConfig};
pub use transport::BulkTransport;
