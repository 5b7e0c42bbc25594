//! End-to-end test infrastructure for the document crawler.
//!
//! Provides a shared TestHarness (a temporary directory tree plus a job
//! config directory) and an in-memory document store standing in for
//! Elasticsearch.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use filetime::{set_file_mtime, FileTime};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crawler_bulk::{
    default_listener, BulkError, BulkFailure, BulkItemResponse, BulkOperation, BulkProcessor,
    BulkProcessorConfig, BulkRequest, BulkResponse, BulkTransport,
};
use crawler_checkpoint::CheckpointStore;
use crawler_client::{ClientError, DocOperation, IndexedDoc, IndexedDocuments};
use crawler_fs::LocalFileAbstractor;
use crawler_orchestrator::{Crawler, ScanSummary};
use crawler_types::Settings;

/// Modification time used for files written by the harness (2021-01-01).
pub const OLD_MTIME: i64 = 1_609_459_200;

/// Document store kept in memory.
///
/// Applies index/delete operations like Elasticsearch would and answers
/// "children of a directory" queries from the stored sources.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<(String, String), Value>>,
    reject_once: Mutex<HashSet<String>>,
    bulk_calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next operation on `id` with a retryable error.
    pub fn reject_once(&self, id: impl Into<String>) {
        self.reject_once.lock().unwrap().insert(id.into());
    }

    pub fn bulk_calls(&self) -> u64 {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    pub fn get(&self, index: &str, id: &str) -> Option<Value> {
        self.docs
            .lock()
            .unwrap()
            .get(&(index.to_string(), id.to_string()))
            .cloned()
    }

    /// Sorted virtual paths of every document in `index`.
    pub fn virtual_paths(&self, index: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .docs
            .lock()
            .unwrap()
            .iter()
            .filter(|((i, _), _)| i == index)
            .filter_map(|(_, source)| {
                source
                    .pointer("/path/virtual")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl BulkTransport<DocOperation> for MemoryStore {
    async fn bulk(&self, request: &BulkRequest<DocOperation>) -> Result<BulkResponse, BulkError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        let mut docs = self.docs.lock().unwrap();
        let mut rejected = self.reject_once.lock().unwrap();

        let items = request
            .operations()
            .iter()
            .enumerate()
            .map(|(position, op)| {
                let index = BulkOperation::index(op);
                if rejected.remove(op.id()) {
                    return BulkItemResponse::failed(
                        position,
                        index,
                        op.id(),
                        BulkFailure::new("rejected execution of coordinating operation")
                            .with_code("es_rejected_execution_exception")
                            .with_status(429),
                    );
                }
                let key = (index.to_string(), op.id().to_string());
                match op {
                    DocOperation::Index { source, .. } => {
                        docs.insert(key, source.clone());
                    }
                    DocOperation::Delete { .. } => {
                        docs.remove(&key);
                    }
                }
                BulkItemResponse::success(position, index, op.id())
            })
            .collect();
        Ok(BulkResponse::new(items))
    }
}

#[async_trait]
impl IndexedDocuments for MemoryStore {
    async fn children(&self, index: &str, parent: &str) -> Result<Vec<IndexedDoc>, ClientError> {
        let docs = self.docs.lock().unwrap();
        Ok(docs
            .iter()
            .filter(|((i, _), source)| {
                i == index && source.pointer("/path/parent").and_then(Value::as_str) == Some(parent)
            })
            .filter_map(|((_, id), source)| {
                let virtual_path = source.pointer("/path/virtual")?.as_str()?.to_string();
                let name = source
                    .pointer("/file/filename")
                    .or_else(|| source.get("name"))?
                    .as_str()?
                    .to_string();
                Some(IndexedDoc {
                    id: id.clone(),
                    name,
                    virtual_path,
                })
            })
            .collect())
    }
}

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Root of the crawled tree
    pub root: PathBuf,
    /// Directory holding job checkpoints
    pub config_dir: PathBuf,
    pub store: Arc<MemoryStore>,
    pub settings: Settings,
}

impl TestHarness {
    /// Create a new harness with an empty tree and default job settings.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join("data");
        let config_dir = temp_dir.path().join("config");
        std::fs::create_dir_all(&root).expect("Failed to create data dir");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        let mut settings = Settings {
            job_name: "e2e".to_string(),
            config_dir: config_dir.to_string_lossy().to_string(),
            ..Default::default()
        };
        settings.fs.url = root.to_string_lossy().to_string();
        settings.elasticsearch.flush_interval_ms = 0;

        Self {
            _temp_dir: temp_dir,
            root,
            config_dir,
            store: Arc::new(MemoryStore::new()),
            settings,
        }
    }

    /// Absolute path of `rel` inside the crawled tree, with `/` separators.
    pub fn path(&self, rel: &str) -> String {
        let root = self.root.to_string_lossy().replace('\\', "/");
        if rel.is_empty() {
            root
        } else {
            format!("{}/{}", root, rel)
        }
    }

    /// Write `content` to `rel`, creating parent directories, with an old mtime.
    pub fn write_file(&self, rel: &str, content: &str) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        set_mtime(&path, OLD_MTIME);
    }

    /// Set the modification time of `rel`.
    pub fn touch(&self, rel: &str, unix_secs: i64) {
        set_mtime(&self.root.join(rel), unix_secs);
    }

    pub fn remove(&self, rel: &str) {
        let path = self.root.join(rel);
        if path.is_dir() {
            std::fs::remove_dir_all(&path).expect("Failed to remove dir");
        } else {
            std::fs::remove_file(&path).expect("Failed to remove file");
        }
    }

    pub fn checkpoint_store(&self) -> CheckpointStore {
        CheckpointStore::new(&self.config_dir)
    }

    /// Crawler wired to the local backend and the in-memory store.
    pub fn crawler(&self) -> (Crawler, Arc<BulkProcessor<DocOperation>>) {
        let processor = Arc::new(BulkProcessor::new(
            BulkProcessorConfig::default()
                .with_bulk_actions(self.settings.elasticsearch.bulk_size)
                .without_flush_interval(),
            self.store.clone(),
            default_listener(self.settings.elasticsearch.retryable_errors.clone()),
        ));
        let crawler = Crawler::new(
            &self.settings,
            Box::new(
                LocalFileAbstractor::new(&self.settings.fs.url)
                    .with_follow_symlinks(self.settings.fs.follow_symlinks),
            ),
            self.checkpoint_store(),
            processor.clone(),
        )
        .expect("Failed to create crawler")
        .with_indexed_documents(self.store.clone());
        (crawler, processor)
    }

    /// Open a crawler, run one scan, and drain the bulk engine.
    pub async fn scan(&self) -> ScanSummary {
        self.scan_with(&CancellationToken::new()).await
    }

    pub async fn scan_with(&self, cancel: &CancellationToken) -> ScanSummary {
        let (mut crawler, processor) = self.crawler();
        crawler.open().await.expect("Failed to open backend");
        let summary = crawler.run_scan(cancel).await.expect("Scan failed");
        processor.close().await;
        crawler.close().await.expect("Failed to close backend");
        summary
    }

    /// File index name of the job.
    pub fn index(&self) -> String {
        self.settings.index_name()
    }

    pub fn folder_index(&self) -> String {
        self.settings.folder_index_name()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn set_mtime(path: &Path, unix_secs: i64) {
    set_file_mtime(path, FileTime::from_unix_time(unix_secs, 0)).expect("Failed to set mtime");
}
