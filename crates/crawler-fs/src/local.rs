//! Local disk backend.
//!
//! Symbolic links are skipped unless link following is enabled. When it is,
//! every directory is resolved to its canonical path and listed at most once
//! per scan, so link cycles end after one turn.

use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crawler_types::{normalize_separators, FileEntry};

use crate::abstractor::{finalize_listing, FileAbstractor, FileStream, NativeEntryMapper};
use crate::error::FsError;

/// Crawls a directory tree on the local filesystem.
#[derive(Debug)]
pub struct LocalFileAbstractor {
    root: String,
    connected: bool,
    follow_symlinks: bool,
    /// Canonical paths of directories handed out in the current scan
    visited_dirs: Mutex<HashSet<PathBuf>>,
}

impl LocalFileAbstractor {
    pub fn new(root: impl AsRef<str>) -> Self {
        Self {
            root: normalize_separators(root.as_ref()),
            connected: false,
            follow_symlinks: false,
            visited_dirs: Mutex::new(HashSet::new()),
        }
    }

    /// Descend into symbolic links instead of skipping them.
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    async fn entry_metadata(&self, path: &Path) -> std::io::Result<Metadata> {
        if self.follow_symlinks {
            tokio::fs::metadata(path).await
        } else {
            tokio::fs::symlink_metadata(path).await
        }
    }

    /// Listing the root starts a new scan.
    async fn reset_visited(&self) {
        let mut visited = self.visited_dirs.lock().await;
        visited.clear();
        match tokio::fs::canonicalize(&self.root).await {
            Ok(root) => {
                visited.insert(root);
            }
            Err(e) => warn!(root = %self.root, error = %e, "Can not resolve root"),
        }
    }

    /// True the first time the directory behind `path` is seen in this scan.
    async fn first_visit(&self, path: &Path) -> bool {
        match tokio::fs::canonicalize(path).await {
            Ok(canonical) => self.visited_dirs.lock().await.insert(canonical),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Can not resolve directory, skipping");
                false
            }
        }
    }
}

#[async_trait]
impl FileAbstractor for LocalFileAbstractor {
    fn name(&self) -> &str {
        "local"
    }

    fn root(&self) -> &str {
        &self.root
    }

    async fn open(&mut self) -> Result<(), FsError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => {
                self.connected = true;
                debug!(root = %self.root, "Opened local backend");
                Ok(())
            }
            Ok(_) => Err(FsError::RootNotFound(self.root.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FsError::RootNotFound(self.root.clone()))
            }
            Err(e) => Err(FsError::io(self.root.clone(), e)),
        }
    }

    async fn close(&mut self) -> Result<(), FsError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn exists(&self, path: &str) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn get_files(&self, dir: &str) -> Result<Vec<FileEntry>, FsError> {
        if !self.connected {
            return Err(FsError::NotConnected);
        }
        debug!(dir = %dir, "Listing local directory");
        if self.follow_symlinks && dir == self.root {
            self.reset_visited().await;
        }

        let mut read_dir = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| FsError::io(dir, e))?;

        let mut entries = Vec::new();
        while let Some(child) = read_dir
            .next_entry()
            .await
            .map_err(|e| FsError::io(dir, e))?
        {
            let name = child.file_name().to_string_lossy().to_string();
            let path = child.path();
            // A dangling link is skipped, not fatal
            let meta = match self.entry_metadata(&path).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(dir = %dir, name = %name, error = %e, "Can not read metadata, skipping");
                    continue;
                }
            };
            if meta.file_type().is_symlink() {
                debug!(dir = %dir, name = %name, "Skipping symbolic link");
                continue;
            }
            if !meta.is_file() && !meta.is_dir() {
                debug!(dir = %dir, name = %name, "Skipping special file");
                continue;
            }
            if self.follow_symlinks && meta.is_dir() && !self.first_visit(&path).await {
                debug!(dir = %dir, name = %name, "Directory already visited in this scan");
                continue;
            }
            entries.push(self.to_file_abstract_model(dir, &(name, meta)));
        }

        Ok(finalize_listing(entries))
    }

    async fn get_input_stream(&self, entry: &FileEntry) -> Result<FileStream, FsError> {
        let file = tokio::fs::File::open(Path::new(&entry.full_path))
            .await
            .map_err(|e| FsError::io(entry.full_path.clone(), e))?;
        Ok(FileStream::new(entry.full_path.clone(), Box::new(file)))
    }

    async fn close_input_stream(&self, stream: FileStream) -> Result<(), FsError> {
        drop(stream);
        Ok(())
    }
}

impl NativeEntryMapper for LocalFileAbstractor {
    type Native = (String, Metadata);

    fn to_file_abstract_model(&self, parent_path: &str, native: &Self::Native) -> FileEntry {
        let (name, meta) = native;
        let entry = if meta.is_dir() {
            FileEntry::directory(name.clone(), parent_path)
        } else {
            FileEntry::file(name.clone(), parent_path).with_size(meta.len())
        };

        let last_modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let entry = entry
            .with_last_modified(last_modified)
            .with_created_at(meta.created().ok().map(DateTime::<Utc>::from))
            .with_last_accessed(meta.accessed().ok().map(DateTime::<Utc>::from));

        with_unix_attributes(entry, meta)
    }
}

#[cfg(unix)]
fn with_unix_attributes(entry: FileEntry, meta: &Metadata) -> FileEntry {
    use std::os::unix::fs::MetadataExt;
    entry
        .with_ownership(Some(meta.uid()), Some(meta.gid()))
        .with_permissions(meta.mode() & 0o7777)
}

#[cfg(not(unix))]
fn with_unix_attributes(entry: FileEntry, meta: &Metadata) -> FileEntry {
    let permissions = if meta.permissions().readonly() { 0o444 } else { 0o644 };
    entry.with_permissions(permissions)
}
