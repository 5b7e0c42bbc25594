//! # crawler-types
//!
//! Shared domain types for the document crawler.
//!
//! This crate defines the data structures used throughout the workspace:
//! - [`FileEntry`]: one scanned filesystem object, identical across backends
//! - [`Doc`] / [`FolderDoc`]: the documents shipped to the document store
//! - [`Settings`]: layered job configuration
//!
//! ## Usage
//!
//! ```rust
//! use crawler_types::FileEntry;
//!
//! let entry = FileEntry::file("report.pdf", "/data/reports");
//! assert_eq!(entry.full_path, "/data/reports/report.pdf");
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod file;

pub use config::{ElasticsearchSettings, FsSettings, Protocol, ServerSettings, Settings};
pub use document::{path_id, Attributes, Doc, FileInfo, FolderDoc, PathInfo};
pub use error::CrawlerError;
pub use file::{compute_virtual_path, join_path, normalize_separators, FileEntry};
