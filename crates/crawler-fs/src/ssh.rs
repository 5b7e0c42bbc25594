//! SFTP backend built on libssh2.
//!
//! libssh2 is blocking, so every call runs on the blocking thread pool.
//! File content is streamed: a blocking task copies the remote file in
//! chunks into a bounded in-memory pipe and stops as soon as the reader
//! is dropped.

use std::io::Read;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use ssh2::{FileStat, Session, Sftp};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crawler_types::{normalize_separators, FileEntry, ServerSettings};

use crate::abstractor::{finalize_listing, FileAbstractor, FileStream, NativeEntryMapper};
use crate::error::FsError;

struct Connection {
    // Keeps the transport alive for the SFTP channel
    _session: Session,
    sftp: Sftp,
}

/// Crawls a directory tree on a remote host over SFTP.
pub struct SshFileAbstractor {
    root: String,
    server: ServerSettings,
    connection: Arc<Mutex<Option<Connection>>>,
}

impl SshFileAbstractor {
    pub fn new(root: impl AsRef<str>, server: ServerSettings) -> Self {
        Self {
            root: normalize_separators(root.as_ref()),
            server,
            connection: Arc::new(Mutex::new(None)),
        }
    }

    fn connect(server: &ServerSettings) -> Result<Connection, FsError> {
        let tcp = TcpStream::connect((server.hostname.as_str(), server.port))
            .map_err(|e| FsError::io(format!("{}:{}", server.hostname, server.port), e))?;
        let mut session = Session::new().map_err(backend)?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(backend)?;

        match (&server.pem_path, &server.password) {
            (Some(pem), _) => session
                .userauth_pubkey_file(&server.username, None, Path::new(pem), None)
                .map_err(backend)?,
            (None, Some(password)) => session
                .userauth_password(&server.username, password.expose_secret())
                .map_err(backend)?,
            (None, None) => {
                return Err(FsError::Backend(
                    "either a password or a pem file is required".to_string(),
                ))
            }
        }
        if !session.authenticated() {
            return Err(FsError::Backend(format!(
                "authentication failed for {}",
                server.username
            )));
        }

        let sftp = session.sftp().map_err(backend)?;
        Ok(Connection {
            _session: session,
            sftp,
        })
    }

    /// Run `f` against the open SFTP channel on the blocking pool.
    async fn with_sftp<T, F>(&self, f: F) -> Result<T, FsError>
    where
        T: Send + 'static,
        F: FnOnce(&Sftp) -> Result<T, FsError> + Send + 'static,
    {
        let connection = self.connection.clone();
        tokio::task::spawn_blocking(move || {
            let guard = connection
                .lock()
                .map_err(|_| FsError::Backend("connection lock poisoned".to_string()))?;
            match guard.as_ref() {
                Some(conn) => f(&conn.sftp),
                None => Err(FsError::NotConnected),
            }
        })
        .await
        .map_err(|e| FsError::Backend(format!("blocking task failed: {}", e)))?
    }
}

fn backend(e: ssh2::Error) -> FsError {
    FsError::Backend(e.to_string())
}

/// Capacity of the pipe between the SFTP reader and the consumer.
const STREAM_BUFFER: usize = 64 * 1024;

const CHUNK_SIZE: usize = 16 * 1024;

/// Copy `source` into `sink` chunk by chunk. Must run on a blocking thread.
///
/// Stops early once the consumer drops its end of the pipe. Returns the
/// number of bytes handed over.
fn pump<R: Read>(mut source: R, mut sink: DuplexStream, handle: &Handle) -> std::io::Result<u64> {
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut copied = 0u64;
    loop {
        let n = match source.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if handle.block_on(sink.write_all(&chunk[..n])).is_err() {
            // Reader is gone
            return Ok(copied);
        }
        copied += n as u64;
    }
    if let Err(e) = handle.block_on(sink.shutdown()) {
        debug!(error = %e, "Stream closed by reader before end of file");
    }
    Ok(copied)
}

fn timestamp(secs: Option<u64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::<Utc>::from_timestamp(i64::try_from(s).ok()?, 0))
}

#[async_trait]
impl FileAbstractor for SshFileAbstractor {
    fn name(&self) -> &str {
        "ssh"
    }

    fn root(&self) -> &str {
        &self.root
    }

    async fn open(&mut self) -> Result<(), FsError> {
        let server = self.server.clone();
        let root = PathBuf::from(&self.root);
        let (conn, is_dir) = tokio::task::spawn_blocking(move || {
            let conn = Self::connect(&server)?;
            let is_dir = conn.sftp.stat(&root).map(|s| s.is_dir()).unwrap_or(false);
            Ok::<_, FsError>((conn, is_dir))
        })
        .await
        .map_err(|e| FsError::Backend(format!("blocking task failed: {}", e)))??;

        if !is_dir {
            return Err(FsError::RootNotFound(self.root.clone()));
        }

        info!(host = %self.server.hostname, root = %self.root, "Opened SFTP backend");
        *self
            .connection
            .lock()
            .map_err(|_| FsError::Backend("connection lock poisoned".to_string()))? = Some(conn);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), FsError> {
        if let Ok(mut guard) = self.connection.lock() {
            if guard.take().is_some() {
                debug!(host = %self.server.hostname, "Closed SFTP backend");
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    async fn exists(&self, path: &str) -> bool {
        let path = PathBuf::from(path);
        self.with_sftp(move |sftp| Ok(sftp.stat(&path).is_ok()))
            .await
            .unwrap_or(false)
    }

    async fn get_files(&self, dir: &str) -> Result<Vec<FileEntry>, FsError> {
        debug!(dir = %dir, "Listing remote directory");
        let path = PathBuf::from(dir);
        let listing = self
            .with_sftp(move |sftp| sftp.readdir(&path).map_err(backend))
            .await?;

        let entries = listing
            .into_iter()
            .filter_map(|(path, stat)| {
                let name = path.file_name()?.to_string_lossy().to_string();
                Some(self.to_file_abstract_model(dir, &(name, stat)))
            })
            .collect();
        Ok(finalize_listing(entries))
    }

    async fn get_input_stream(&self, entry: &FileEntry) -> Result<FileStream, FsError> {
        let full_path = entry.full_path.clone();
        let path = PathBuf::from(&full_path);
        let file = self
            .with_sftp(move |sftp| sftp.open(&path).map_err(backend))
            .await?;

        let (reader, writer) = tokio::io::duplex(STREAM_BUFFER);
        let handle = Handle::current();
        let log_path = full_path.clone();
        tokio::task::spawn_blocking(move || match pump(file, writer, &handle) {
            Ok(bytes) => debug!(path = %log_path, bytes, "Remote stream finished"),
            Err(e) => warn!(path = %log_path, error = %e, "Remote read failed, content truncated"),
        });
        Ok(FileStream::new(full_path, Box::new(reader)))
    }

    async fn close_input_stream(&self, stream: FileStream) -> Result<(), FsError> {
        drop(stream);
        Ok(())
    }
}

impl NativeEntryMapper for SshFileAbstractor {
    type Native = (String, FileStat);

    fn to_file_abstract_model(&self, parent_path: &str, native: &Self::Native) -> FileEntry {
        let (name, stat) = native;
        let entry = if stat.is_dir() {
            FileEntry::directory(name.clone(), parent_path)
        } else {
            FileEntry::file(name.clone(), parent_path).with_size(stat.size.unwrap_or(0))
        };
        entry
            .with_last_modified(timestamp(stat.mtime).unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
            .with_last_accessed(timestamp(stat.atime))
            .with_ownership(stat.uid, stat.gid)
            .with_permissions(stat.perm.unwrap_or(0) & 0o7777)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;

    fn server() -> ServerSettings {
        ServerSettings {
            hostname: "localhost".to_string(),
            port: 22,
            username: "crawler".to_string(),
            password: Some(SecretString::from("secret")),
            pem_path: None,
            protocol: crawler_types::Protocol::Ssh,
        }
    }

    #[test]
    fn test_maps_file_stat() {
        let fs = SshFileAbstractor::new("/data", server());
        let stat = FileStat {
            size: Some(42),
            uid: Some(1000),
            gid: Some(100),
            perm: Some(0o100644),
            atime: Some(1_700_000_100),
            mtime: Some(1_700_000_000),
        };
        let entry = fs.to_file_abstract_model("/data/docs", &("a.txt".to_string(), stat));
        assert!(entry.is_file);
        assert_eq!(entry.size_bytes, 42);
        assert_eq!(entry.full_path, "/data/docs/a.txt");
        assert_eq!(entry.permissions, 0o644);
        assert_eq!(entry.owner_id, Some(1000));
        assert_eq!(entry.last_modified.timestamp(), 1_700_000_000);
        assert_eq!(fs.virtual_path(&entry), "/docs/a.txt");
    }

    #[tokio::test]
    async fn test_not_connected_before_open() {
        let mut fs = SshFileAbstractor::new("/data", server());
        assert!(!fs.is_connected());
        assert!(matches!(
            fs.get_files("/data").await,
            Err(FsError::NotConnected)
        ));
        assert!(!fs.exists("/data").await);
        fs.close().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stream_delivers_whole_file() {
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let expected = content.clone();
        let (mut reader, writer) = tokio::io::duplex(STREAM_BUFFER);
        let handle = Handle::current();
        let pumping =
            tokio::task::spawn_blocking(move || pump(Cursor::new(content), writer, &handle));

        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, expected);
        assert_eq!(pumping.await.unwrap().unwrap(), 200_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stream_stops_when_reader_is_dropped() {
        let size = 4 * 1024 * 1024;
        let (mut reader, writer) = tokio::io::duplex(STREAM_BUFFER);
        let handle = Handle::current();
        let pumping =
            tokio::task::spawn_blocking(move || pump(Cursor::new(vec![b'x'; size]), writer, &handle));

        let mut head = vec![0u8; 100];
        reader.read_exact(&mut head).await.unwrap();
        drop(reader);

        let copied = pumping.await.unwrap().unwrap();
        assert!(copied < (STREAM_BUFFER + 2 * CHUNK_SIZE) as u64);
    }
}
