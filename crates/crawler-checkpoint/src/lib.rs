//! Resumable crawl checkpoints.
//!
//! A checkpoint records which paths of a crawl are pending, in flight and
//! completed, so a crawl can pause, crash and resume without re-scanning
//! or double-indexing.
//!
//! ## Key Components
//!
//! - [`CrawlCheckpoint`]: In-memory progress state for one scan
//! - [`CrawlState`]: Lifecycle of a crawl job
//! - [`CheckpointStore`]: Atomic JSON persistence, one file per job
//! - [`CheckpointError`]: Error types for checkpoint operations
//!
//! ## Example
//!
//! ```ignore
//! use crawler_checkpoint::{CheckpointStore, CrawlCheckpoint};
//!
//! let store = CheckpointStore::new(config_dir);
//! let mut checkpoint = store
//!     .read("docs")?
//!     .unwrap_or_else(|| CrawlCheckpoint::new_checkpoint("/srv/share"));
//!
//! while let Some(path) = checkpoint.poll_next_path() {
//!     // list and index `path`, queue sub-directories with add_path()
//!     checkpoint.mark_completed(&path);
//!     store.write("docs", &checkpoint)?;
//! }
//! ```

pub mod checkpoint;
pub mod error;
pub mod store;

pub use checkpoint::{CrawlCheckpoint, CrawlState};
pub use error::CheckpointError;
pub use store::CheckpointStore;
