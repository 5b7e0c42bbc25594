//! # crawler-client
//!
//! Document-store side of the crawler.
//!
//! - [`DocOperation`]: index/delete operations fed to the bulk engine
//! - [`ElasticClient`]: `_bulk` transport and index management over HTTP
//! - [`IndexedDocuments`]: lookup of what a previous scan already indexed,
//!   used to detect deleted files
//! - [`ClientError`]: Error types for store requests

pub mod elastic;
pub mod error;
pub mod indexed;
pub mod operation;

pub use elastic::{parse_bulk_response, render_bulk_body, ElasticClient};
pub use error::ClientError;
pub use indexed::{IndexedDoc, IndexedDocuments};
pub use operation::DocOperation;
