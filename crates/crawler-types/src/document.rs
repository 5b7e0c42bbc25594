//! Documents shipped to the document store.
//!
//! A [`Doc`] describes one indexed file, a [`FolderDoc`] one indexed
//! directory. Both serialize to the JSON shape stored in the index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::file::FileEntry;

/// Stable identifier derived from a path (hex-encoded BLAKE3 digest).
pub fn path_id(path: &str) -> String {
    blake3::hash(path.as_bytes()).to_hex().to_string()
}

/// File metadata stored with a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub extension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_chars: Option<usize>,
    pub last_modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    pub indexing_date: DateTime<Utc>,
}

/// Location of a document, both on the backend and inside the crawl root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    /// Backend path as listed
    pub real: String,

    /// Path relative to the crawl root
    #[serde(rename = "virtual")]
    pub virtual_path: String,

    /// Virtual path of the containing directory, used to find children
    pub parent: String,
}

/// Ownership attributes, only present when the backend reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<u32>,
    pub permissions: u32,
}

/// One indexed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub file: FileInfo,
    pub path: PathInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

impl Doc {
    /// Build the document for `entry`, located at `virtual_path` in the crawl.
    pub fn from_entry(entry: &FileEntry, virtual_path: &str, add_filesize: bool) -> Self {
        let attributes = if entry.owner_id.is_some() || entry.group_id.is_some() {
            Some(Attributes {
                owner: entry.owner_id,
                group: entry.group_id,
                permissions: entry.permissions,
            })
        } else {
            None
        };

        Self {
            content: None,
            file: FileInfo {
                filename: entry.name.clone(),
                extension: entry.extension.clone(),
                filesize: add_filesize.then_some(entry.size_bytes),
                indexed_chars: None,
                last_modified: entry.last_modified,
                created: entry.created_at,
                last_accessed: entry.last_accessed,
                indexing_date: Utc::now(),
            },
            path: PathInfo {
                real: entry.full_path.clone(),
                virtual_path: virtual_path.to_string(),
                parent: parent_of(virtual_path),
            },
            attributes,
        }
    }

    /// Attach extracted text.
    pub fn with_content(mut self, content: String, indexed_chars: Option<usize>) -> Self {
        self.content = Some(content);
        self.file.indexed_chars = indexed_chars;
        self
    }
}

/// One indexed directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderDoc {
    pub name: String,
    pub path: PathInfo,
    pub last_modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl FolderDoc {
    /// Build the folder document for a directory at `virtual_path`.
    pub fn new(name: &str, real: &str, virtual_path: &str, last_modified: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            path: PathInfo {
                real: real.to_string(),
                virtual_path: virtual_path.to_string(),
                parent: parent_of(virtual_path),
            },
            last_modified,
            created: None,
        }
    }
}

fn parent_of(virtual_path: &str) -> String {
    match virtual_path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => virtual_path[..idx].to_string(),
    }
}
