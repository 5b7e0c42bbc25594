//! Backend-neutral model of a scanned filesystem object.
//!
//! Every backend maps its native listing entries into a [`FileEntry`], so the
//! crawl loop, filtering and checkpointing never see backend-specific types.
//! Paths are always expressed with `/` separators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scanned filesystem object.
///
/// Built fresh on every directory listing and never mutated afterwards.
/// Checkpoints persist paths, not entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File or directory name, without any path component
    pub name: String,

    /// True for regular files
    pub is_file: bool,

    /// True for directories
    pub is_directory: bool,

    /// Last modification time
    pub last_modified: DateTime<Utc>,

    /// Creation time, when the backend reports one
    pub created_at: Option<DateTime<Utc>>,

    /// Last access time, when the backend reports one
    pub last_accessed: Option<DateTime<Utc>>,

    /// Extension without the leading dot (empty when there is none)
    pub extension: String,

    /// Normalized path of the containing directory
    pub parent_path: String,

    /// Normalized `parent_path + "/" + name`
    pub full_path: String,

    /// Size in bytes (0 for directories on most backends)
    pub size_bytes: u64,

    /// Numeric owner id, when the backend exposes one
    pub owner_id: Option<u32>,

    /// Numeric group id, when the backend exposes one
    pub group_id: Option<u32>,

    /// Permission bits (e.g. `0o644`)
    pub permissions: u32,
}

impl FileEntry {
    fn new(name: impl Into<String>, parent_path: &str, is_file: bool) -> Self {
        let name = name.into();
        let parent_path = normalize_separators(parent_path);
        let full_path = join_path(&parent_path, &name);
        let extension = if is_file {
            extension_of(&name)
        } else {
            String::new()
        };

        Self {
            name,
            is_file,
            is_directory: !is_file,
            last_modified: DateTime::<Utc>::UNIX_EPOCH,
            created_at: None,
            last_accessed: None,
            extension,
            parent_path,
            full_path,
            size_bytes: 0,
            owner_id: None,
            group_id: None,
            permissions: 0,
        }
    }

    /// Create an entry describing a regular file.
    pub fn file(name: impl Into<String>, parent_path: &str) -> Self {
        Self::new(name, parent_path, true)
    }

    /// Create an entry describing a directory.
    pub fn directory(name: impl Into<String>, parent_path: &str) -> Self {
        Self::new(name, parent_path, false)
    }

    /// Set the modification time.
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Set the creation time.
    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the access time.
    pub fn with_last_accessed(mut self, last_accessed: Option<DateTime<Utc>>) -> Self {
        self.last_accessed = last_accessed;
        self
    }

    /// Set the size in bytes.
    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    /// Set owner and group ids.
    pub fn with_ownership(mut self, owner_id: Option<u32>, group_id: Option<u32>) -> Self {
        self.owner_id = owner_id;
        self.group_id = group_id;
        self
    }

    /// Set permission bits.
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Path of this entry relative to the crawl root.
    pub fn virtual_path(&self, root: &str) -> String {
        compute_virtual_path(root, &self.full_path)
    }

    /// Whether the entry changed after `since`.
    ///
    /// Both the modification and the creation date are considered, so a file
    /// copied in with an old mtime is still picked up.
    pub fn changed_since(&self, since: DateTime<Utc>) -> bool {
        self.last_modified > since || self.created_at.is_some_and(|c| c > since)
    }
}

/// Replace backslashes with forward slashes.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Join a parent path and a child name with exactly one `/`.
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = normalize_separators(parent);
    if parent.is_empty() {
        name.to_string()
    } else if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Compute the path of `full_path` relative to `root`, always starting with `/`.
///
/// The root itself maps to `/`. Paths outside the root are returned
/// normalized but otherwise unchanged.
pub fn compute_virtual_path(root: &str, full_path: &str) -> String {
    let root = normalize_separators(root);
    let root = root.trim_end_matches('/');
    let full_path = normalize_separators(full_path);

    match full_path.strip_prefix(root) {
        Some("") => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        Some(_) | None => full_path,
    }
}

fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(0) | None => String::new(),
        Some(idx) => name[idx + 1..].to_string(),
    }
}
