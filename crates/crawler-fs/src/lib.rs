//! # crawler-fs
//!
//! File abstraction shared by every crawl backend.
//!
//! Each backend (local disk, SFTP, ...) implements [`FileAbstractor`] and
//! maps its native listing entries into [`crawler_types::FileEntry`], so the
//! crawl loop, filtering and checkpointing stay backend-independent.
//!
//! ## Core Components
//!
//! - [`FileAbstractor`]: Trait every backend implements
//! - [`LocalFileAbstractor`]: Local disk backend
//! - [`PathFilter`]: Include/exclude glob filtering on virtual paths
//! - [`FsError`]: Error types for backend operations
//!
//! The SFTP backend is available behind the `ssh` feature.

pub mod abstractor;
pub mod error;
pub mod filter;
pub mod local;
#[cfg(feature = "ssh")]
pub mod ssh;

pub use abstractor::{finalize_listing, FileAbstractor, FileStream, NativeEntryMapper};
pub use error::FsError;
pub use filter::{is_indexable, PathFilter};
pub use local::LocalFileAbstractor;
#[cfg(feature = "ssh")]
pub use ssh::SshFileAbstractor;
