//! The capability contract implemented once per backend.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crawler_types::FileEntry;

use crate::error::FsError;

/// Byte stream over one file's content.
///
/// Hand it back to [`FileAbstractor::close_input_stream`] when done so the
/// backend can run its completion step.
pub struct FileStream {
    path: String,
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl FileStream {
    pub fn new(path: impl Into<String>, reader: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        Self {
            path: path.into(),
            reader,
        }
    }

    /// Path of the file being read.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read the whole stream, or at most `limit` bytes.
    pub async fn read_to_end_limited(&mut self, limit: Option<usize>) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        match limit {
            Some(limit) => {
                (&mut self.reader)
                    .take(limit as u64)
                    .read_to_end(&mut buf)
                    .await?;
            }
            None => {
                self.reader.read_to_end(&mut buf).await?;
            }
        }
        Ok(buf)
    }
}

impl AsyncRead for FileStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.reader).poll_read(cx, buf)
    }
}

impl std::fmt::Debug for FileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStream").field("path", &self.path).finish()
    }
}

/// Uniform view of "files and directories" over one backend.
///
/// # Contract
///
/// - `close()` is safe to call even when `open()` failed partway
/// - `exists()` never fails on "not found"; it returns `false`
/// - `get_files()` lists immediate children only, without `.` and `..`,
///   newest first, and returns an empty vec for an empty directory
#[async_trait]
pub trait FileAbstractor: Send + Sync {
    /// Short backend name for logs (e.g. "local", "ssh").
    fn name(&self) -> &str;

    /// Normalized crawl root the virtual paths are relative to.
    fn root(&self) -> &str;

    /// Establish the backend connection.
    async fn open(&mut self) -> Result<(), FsError>;

    /// Release the backend connection.
    async fn close(&mut self) -> Result<(), FsError>;

    fn is_connected(&self) -> bool;

    async fn exists(&self, path: &str) -> bool;

    async fn get_files(&self, dir: &str) -> Result<Vec<FileEntry>, FsError>;

    async fn get_input_stream(&self, entry: &FileEntry) -> Result<FileStream, FsError>;

    /// Finish reading a stream, running any backend completion step.
    async fn close_input_stream(&self, stream: FileStream) -> Result<(), FsError>;

    /// Path of `entry` relative to [`root`](Self::root).
    fn virtual_path(&self, entry: &FileEntry) -> String {
        entry.virtual_path(self.root())
    }
}

/// Backend-specific mapping from a native listing entry to a [`FileEntry`].
pub trait NativeEntryMapper {
    type Native;

    fn to_file_abstract_model(&self, parent_path: &str, native: &Self::Native) -> FileEntry;
}

/// Drop `.`/`..` and order entries newest first (name breaks ties).
pub fn finalize_listing(entries: Vec<FileEntry>) -> Vec<FileEntry> {
    let mut entries: Vec<FileEntry> = entries
        .into_iter()
        .filter(|e| !e.name.is_empty() && e.name != "." && e.name != "..")
        .collect();
    entries.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| a.name.cmp(&b.name))
    });
    entries
}
