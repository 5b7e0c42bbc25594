//! The crawl loop.
//!
//! One scan walks the tree breadth first through the checkpoint's pending
//! queue. For every directory it lists the children, queues sub-directories,
//! turns indexable files into bulk operations, optionally removes documents
//! of deleted files, then marks the directory completed and persists the
//! checkpoint. A crash at any point resumes from the last persisted state;
//! documents may be sent twice, never lost.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crawler_bulk::BulkProcessor;
use crawler_checkpoint::{CheckpointStore, CrawlCheckpoint, CrawlState};
use crawler_client::{DocOperation, IndexedDocuments};
use crawler_fs::{FileAbstractor, PathFilter};
use crawler_types::{
    compute_virtual_path, path_id, Doc, FileEntry, FolderDoc, FsSettings, Settings,
};

use crate::error::OrchestratorError;
use crate::extract::{ContentExtractor, PlainTextExtractor};

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every pending path was visited
    Completed,
    /// The job is paused; nothing more was crawled
    Paused,
    /// Shutdown was requested between two paths
    Cancelled,
}

/// Statistics of one `run_scan` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub outcome: ScanOutcome,
    pub scan_id: String,
    /// Cumulative over the scan, including work done before a resume
    pub files_processed: u64,
    pub files_deleted: u64,
    pub files_failed: u64,
    pub paths_completed: u64,
    pub paths_abandoned: u64,
}

impl ScanSummary {
    fn new(outcome: ScanOutcome, checkpoint: &CrawlCheckpoint) -> Self {
        Self {
            outcome,
            scan_id: checkpoint.scan_id.clone(),
            files_processed: checkpoint.files_processed,
            files_deleted: checkpoint.files_deleted,
            files_failed: 0,
            paths_completed: 0,
            paths_abandoned: 0,
        }
    }
}

/// Drives one crawl job.
pub struct Crawler {
    job_name: String,
    fs_settings: FsSettings,
    index: String,
    folder_index: String,
    fs: Box<dyn FileAbstractor>,
    store: CheckpointStore,
    processor: Arc<BulkProcessor<DocOperation>>,
    filter: PathFilter,
    extractor: Arc<dyn ContentExtractor>,
    indexed: Option<Arc<dyn IndexedDocuments>>,
}

impl Crawler {
    /// Create a crawler for the job described by `settings`.
    ///
    /// # Errors
    ///
    /// Fails when an include or exclude pattern does not compile.
    pub fn new(
        settings: &Settings,
        fs: Box<dyn FileAbstractor>,
        store: CheckpointStore,
        processor: Arc<BulkProcessor<DocOperation>>,
    ) -> Result<Self, OrchestratorError> {
        let filter = PathFilter::new(&settings.fs.includes, &settings.fs.excludes)?;
        Ok(Self {
            job_name: settings.job_name.clone(),
            fs_settings: settings.fs.clone(),
            index: settings.index_name(),
            folder_index: settings.folder_index_name(),
            fs,
            store,
            processor,
            filter,
            extractor: Arc::new(PlainTextExtractor),
            indexed: None,
        })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Enable removal of documents whose files disappeared.
    pub fn with_indexed_documents(mut self, indexed: Arc<dyn IndexedDocuments>) -> Self {
        self.indexed = Some(indexed);
        self
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Connect the backend. Failure here is fatal for the job.
    pub async fn open(&mut self) -> Result<(), OrchestratorError> {
        if let Err(e) = self.fs.open().await {
            error!(job = %self.job_name, backend = %self.fs.name(), error = %e, "Can not open backend");
            // Release whatever the partial open acquired
            if let Err(close_err) = self.fs.close().await {
                debug!(error = %close_err, "Close after failed open");
            }
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), OrchestratorError> {
        self.fs.close().await?;
        Ok(())
    }

    /// Run scans until cancelled, or `max_runs` scans have completed.
    ///
    /// Between scans, and while the job is paused, waits `update_rate`.
    pub async fn run(
        &mut self,
        cancel: &CancellationToken,
        max_runs: Option<u32>,
    ) -> Result<(), OrchestratorError> {
        let update_rate = Duration::from_secs(self.fs_settings.update_rate_secs);
        let mut completed_runs = 0u32;

        loop {
            let summary = self.run_scan(cancel).await?;
            match summary.outcome {
                ScanOutcome::Cancelled => break,
                ScanOutcome::Completed => {
                    completed_runs += 1;
                    if max_runs.is_some_and(|max| completed_runs >= max) {
                        info!(job = %self.job_name, runs = completed_runs, "Requested runs done");
                        break;
                    }
                }
                ScanOutcome::Paused => {
                    info!(job = %self.job_name, "Job is paused, waiting");
                }
            }

            debug!(job = %self.job_name, wait_secs = update_rate.as_secs(), "Waiting for next scan");
            tokio::select! {
                _ = tokio::time::sleep(update_rate) => {}
                _ = cancel.cancelled() => break,
            }
        }
        Ok(())
    }

    /// Run or resume one scan.
    ///
    /// # Errors
    ///
    /// Only checkpoint persistence failures and a closed bulk engine stop the
    /// scan; backend and per-file errors are recorded and skipped.
    pub async fn run_scan(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<ScanSummary, OrchestratorError> {
        let mut checkpoint = match self.load_checkpoint()? {
            Some(checkpoint) if checkpoint.state == CrawlState::Paused => {
                return Ok(ScanSummary::new(ScanOutcome::Paused, &checkpoint));
            }
            Some(checkpoint) if checkpoint.is_resumable() => {
                info!(
                    job = %self.job_name,
                    scan_id = %checkpoint.scan_id,
                    pending = checkpoint.pending_paths.len(),
                    completed = checkpoint.completed_paths.len(),
                    "Resuming scan"
                );
                checkpoint
            }
            previous => self.start_scan(previous.as_ref()).await?,
        };

        // The path being processed when the job stopped was never completed
        if let Some(current) = checkpoint.current_path.clone() {
            checkpoint.add_path_first(current);
        }
        let scan_date = checkpoint.scan_date;
        self.store.write(&self.job_name, &checkpoint)?;

        let mut summary = ScanSummary::new(ScanOutcome::Completed, &checkpoint);

        loop {
            if cancel.is_cancelled() {
                info!(job = %self.job_name, "Shutdown requested, stopping scan");
                summary.outcome = ScanOutcome::Cancelled;
                break;
            }
            if self.pause_requested() {
                info!(job = %self.job_name, "Pause requested, stopping scan");
                checkpoint.pause();
                summary.outcome = ScanOutcome::Paused;
                break;
            }
            let Some(path) = checkpoint.poll_next_path() else {
                break;
            };

            match self
                .process_directory(&path, scan_date, &mut checkpoint, &mut summary)
                .await
            {
                Ok(()) => {
                    checkpoint.mark_completed(path.as_str());
                    summary.paths_completed += 1;
                }
                Err(e) if e.is_transient() => {
                    let attempts = checkpoint.increment_retry_count();
                    checkpoint.record_error(e.to_string());
                    if attempts > self.fs_settings.max_retries {
                        warn!(
                            job = %self.job_name,
                            path = %path,
                            attempts,
                            error = %e,
                            "Giving up on directory"
                        );
                        checkpoint.abandon_current(format!("{}: {}", path, e));
                        summary.paths_abandoned += 1;
                    } else {
                        warn!(
                            job = %self.job_name,
                            path = %path,
                            attempt = attempts,
                            error = %e,
                            "Can not list directory, will retry"
                        );
                        checkpoint.add_path_first(path.as_str());
                    }
                }
                Err(e) => {
                    error!(job = %self.job_name, path = %path, error = %e, "Fatal crawl error");
                    checkpoint.fail(e.to_string());
                    self.persist_after_failure(&checkpoint);
                    return Err(e);
                }
            }
            self.store.write(&self.job_name, &checkpoint)?;
        }

        if summary.outcome == ScanOutcome::Completed {
            if let Err(e) = self.processor.flush().await {
                checkpoint.fail(e.to_string());
                self.persist_after_failure(&checkpoint);
                return Err(e.into());
            }
            checkpoint.complete();
            info!(
                job = %self.job_name,
                scan_id = %checkpoint.scan_id,
                files_processed = checkpoint.files_processed,
                files_deleted = checkpoint.files_deleted,
                abandoned = summary.paths_abandoned,
                "Scan completed"
            );
        }
        self.store.write(&self.job_name, &checkpoint)?;

        summary.files_processed = checkpoint.files_processed;
        summary.files_deleted = checkpoint.files_deleted;
        Ok(summary)
    }

    fn load_checkpoint(&self) -> Result<Option<CrawlCheckpoint>, OrchestratorError> {
        match self.store.read(&self.job_name) {
            Ok(checkpoint) => Ok(checkpoint),
            Err(e) if e.is_unreadable() => {
                warn!(job = %self.job_name, error = %e, "Checkpoint is corrupt, starting a fresh scan");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn pause_requested(&self) -> bool {
        matches!(
            self.store.read(&self.job_name),
            Ok(Some(ref persisted)) if persisted.state == CrawlState::Paused
        )
    }

    fn persist_after_failure(&self, checkpoint: &CrawlCheckpoint) {
        if let Err(e) = self.store.write(&self.job_name, checkpoint) {
            error!(job = %self.job_name, error = %e, "Can not persist failed checkpoint");
        }
    }

    async fn start_scan(
        &self,
        previous: Option<&CrawlCheckpoint>,
    ) -> Result<CrawlCheckpoint, OrchestratorError> {
        let root = self.fs.root().to_string();
        let checkpoint = match previous {
            Some(previous) => previous.next_scan(root.as_str()),
            None => CrawlCheckpoint::new_checkpoint(root.as_str()),
        };
        info!(
            job = %self.job_name,
            scan_id = %checkpoint.scan_id,
            root = %root,
            incremental_since = ?checkpoint.scan_date,
            "Starting scan"
        );

        if self.fs_settings.index_folders {
            let name = root.rsplit('/').find(|s| !s.is_empty()).unwrap_or("/");
            let folder = FolderDoc::new(name, &root, "/", Utc::now());
            self.processor
                .add(DocOperation::index(&self.folder_index, path_id("/"), &folder)?)
                .await?;
        }
        Ok(checkpoint)
    }

    async fn process_directory(
        &self,
        dir: &str,
        scan_date: Option<DateTime<Utc>>,
        checkpoint: &mut CrawlCheckpoint,
        summary: &mut ScanSummary,
    ) -> Result<(), OrchestratorError> {
        let entries = self.fs.get_files(dir).await?;
        let dir_virtual = compute_virtual_path(self.fs.root(), dir);
        debug!(job = %self.job_name, dir = %dir_virtual, entries = entries.len(), "Processing directory");

        let mut present_files = HashSet::new();
        let mut present_dirs = HashSet::new();

        for entry in &entries {
            let virtual_path = self.fs.virtual_path(entry);

            if entry.is_directory {
                if !self.filter.is_directory_indexable(&virtual_path) {
                    debug!(path = %virtual_path, "Directory excluded");
                    continue;
                }
                present_dirs.insert(entry.name.clone());
                checkpoint.add_path(entry.full_path.as_str());
                if self.fs_settings.index_folders {
                    let folder = FolderDoc::new(
                        &entry.name,
                        &entry.full_path,
                        &virtual_path,
                        entry.last_modified,
                    );
                    self.processor
                        .add(DocOperation::index(
                            &self.folder_index,
                            path_id(&virtual_path),
                            &folder,
                        )?)
                        .await?;
                }
                continue;
            }

            if !self.filter.is_indexable(&virtual_path) {
                continue;
            }
            if let Some(limit) = self.fs_settings.ignore_above {
                if entry.size_bytes > limit {
                    debug!(path = %virtual_path, size = entry.size_bytes, limit, "File too large, skipping");
                    continue;
                }
            }
            present_files.insert(entry.name.clone());

            if let Some(since) = scan_date {
                if !entry.changed_since(since) {
                    continue;
                }
            }

            match self.index_file(entry, &virtual_path).await {
                Ok(()) => checkpoint.increment_files_processed(),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(job = %self.job_name, path = %virtual_path, error = %e, "Can not index file, skipping");
                    summary.files_failed += 1;
                }
            }
        }

        if self.fs_settings.remove_deleted && scan_date.is_some() {
            if let Some(indexed) = &self.indexed {
                let deleted = self
                    .remove_deleted(indexed.as_ref(), &dir_virtual, &present_files, &present_dirs)
                    .await?;
                for _ in 0..deleted {
                    checkpoint.increment_files_deleted();
                }
            }
        }
        Ok(())
    }

    fn document_id(&self, entry: &FileEntry, virtual_path: &str) -> String {
        if self.fs_settings.filename_as_id {
            entry.name.clone()
        } else {
            path_id(virtual_path)
        }
    }

    async fn index_file(&self, entry: &FileEntry, virtual_path: &str) -> Result<(), OrchestratorError> {
        let mut doc = Doc::from_entry(entry, virtual_path, self.fs_settings.add_filesize);

        if self.fs_settings.index_content {
            let mut stream = self.fs.get_input_stream(entry).await?;
            let extracted = self
                .extractor
                .extract(entry, &mut stream, self.fs_settings.indexed_chars)
                .await;
            self.fs.close_input_stream(stream).await?;
            let content = extracted.map_err(|source| OrchestratorError::Extract {
                path: entry.full_path.clone(),
                source,
            })?;
            doc = doc.with_content(content, self.fs_settings.indexed_chars);
        }

        let id = self.document_id(entry, virtual_path);
        debug!(path = %virtual_path, id = %id, "Indexing file");
        self.processor
            .add(DocOperation::index(&self.index, id, &doc)?)
            .await?;
        Ok(())
    }

    /// Delete documents of `dir_virtual`'s children that are gone.
    ///
    /// Store lookups that fail are logged; a later scan will try again.
    async fn remove_deleted(
        &self,
        indexed: &dyn IndexedDocuments,
        dir_virtual: &str,
        present_files: &HashSet<String>,
        present_dirs: &HashSet<String>,
    ) -> Result<u64, OrchestratorError> {
        let mut deleted = 0;

        match indexed.children(&self.index, dir_virtual).await {
            Ok(docs) => {
                let gone = docs
                    .iter()
                    .filter(|d| d.virtual_path != dir_virtual && !present_files.contains(&d.name));
                for doc in gone {
                    debug!(path = %doc.virtual_path, "File removed, deleting document");
                    self.processor
                        .add(DocOperation::delete(&self.index, &doc.id))
                        .await?;
                    deleted += 1;
                }
            }
            Err(e) => warn!(dir = %dir_virtual, error = %e, "Can not list indexed files"),
        }

        if !self.fs_settings.index_folders {
            return Ok(deleted);
        }

        let mut removed_dirs = Vec::new();
        match indexed.children(&self.folder_index, dir_virtual).await {
            Ok(docs) => {
                // The root folder document is its own parent
                removed_dirs.extend(docs.into_iter().filter(|d| {
                    d.virtual_path != dir_virtual && !present_dirs.contains(&d.name)
                }));
            }
            Err(e) => warn!(dir = %dir_virtual, error = %e, "Can not list indexed folders"),
        }

        // Everything below a removed directory goes too
        while let Some(folder) = removed_dirs.pop() {
            debug!(path = %folder.virtual_path, "Folder removed, deleting its documents");
            self.processor
                .add(DocOperation::delete(&self.folder_index, &folder.id))
                .await?;

            match indexed.children(&self.index, &folder.virtual_path).await {
                Ok(docs) => {
                    for doc in docs {
                        self.processor
                            .add(DocOperation::delete(&self.index, &doc.id))
                            .await?;
                        deleted += 1;
                    }
                }
                Err(e) => warn!(dir = %folder.virtual_path, error = %e, "Can not list indexed files"),
            }
            match indexed.children(&self.folder_index, &folder.virtual_path).await {
                Ok(docs) => removed_dirs.extend(
                    docs.into_iter()
                        .filter(|d| d.virtual_path != folder.virtual_path),
                ),
                Err(e) => warn!(dir = %folder.virtual_path, error = %e, "Can not list indexed folders"),
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use crawler_bulk::{
        BulkError, BulkItemResponse, BulkOperation, BulkProcessorConfig, BulkRequest,
        BulkResponse, BulkTransport, LoggingListener,
    };
    use crawler_fs::{FileStream, FsError};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        operations: Mutex<Vec<DocOperation>>,
    }

    impl Recorder {
        fn ids(&self, index: &str) -> Vec<String> {
            self.operations
                .lock()
                .unwrap()
                .iter()
                .filter(|op| !op.is_delete() && BulkOperation::index(*op) == index)
                .map(|op| op.id().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl BulkTransport<DocOperation> for Recorder {
        async fn bulk(&self, request: &BulkRequest<DocOperation>) -> Result<BulkResponse, BulkError> {
            let items = request
                .operations()
                .iter()
                .enumerate()
                .map(|(i, op)| BulkItemResponse::success(i, BulkOperation::index(op), op.id()))
                .collect();
            self.operations
                .lock()
                .unwrap()
                .extend(request.operations().iter().cloned());
            Ok(BulkResponse::new(items))
        }
    }

    /// Backend over an in-memory tree whose listings can be made to fail.
    struct FlakyFs {
        root: String,
        failures_left: Mutex<u32>,
        failing_dir: String,
    }

    #[async_trait]
    impl FileAbstractor for FlakyFs {
        fn name(&self) -> &str {
            "flaky"
        }
        fn root(&self) -> &str {
            &self.root
        }
        async fn open(&mut self) -> Result<(), FsError> {
            Ok(())
        }
        async fn close(&mut self) -> Result<(), FsError> {
            Ok(())
        }
        fn is_connected(&self) -> bool {
            true
        }
        async fn exists(&self, _path: &str) -> bool {
            true
        }
        async fn get_files(&self, dir: &str) -> Result<Vec<FileEntry>, FsError> {
            if dir == self.failing_dir {
                let mut left = self.failures_left.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    return Err(FsError::Backend("connection reset".to_string()));
                }
            }
            Ok(match dir {
                "/r" => vec![
                    FileEntry::file("a.txt", "/r"),
                    FileEntry::directory("bad", "/r"),
                ],
                "/r/bad" => vec![FileEntry::file("b.txt", "/r/bad")],
                _ => Vec::new(),
            })
        }
        async fn get_input_stream(&self, entry: &FileEntry) -> Result<FileStream, FsError> {
            Ok(FileStream::new(entry.full_path.clone(), Box::new(&b"text"[..])))
        }
        async fn close_input_stream(&self, _stream: FileStream) -> Result<(), FsError> {
            Ok(())
        }
    }

    fn settings(max_retries: u32) -> Settings {
        let mut settings = Settings::default();
        settings.job_name = "job".to_string();
        settings.fs.url = "/r".to_string();
        settings.fs.index_folders = false;
        settings.fs.max_retries = max_retries;
        settings
    }

    fn crawler(
        dir: &TempDir,
        failures: u32,
        max_retries: u32,
    ) -> (Crawler, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let processor = Arc::new(BulkProcessor::new(
            BulkProcessorConfig::default().without_flush_interval(),
            recorder.clone(),
            LoggingListener,
        ));
        let fs = FlakyFs {
            root: "/r".to_string(),
            failures_left: Mutex::new(failures),
            failing_dir: "/r/bad".to_string(),
        };
        let crawler = Crawler::new(
            &settings(max_retries),
            Box::new(fs),
            CheckpointStore::new(dir.path()),
            processor,
        )
        .unwrap();
        (crawler, recorder)
    }

    #[tokio::test]
    async fn test_transient_error_is_retried() {
        let dir = TempDir::new().unwrap();
        let (mut crawler, recorder) = crawler(&dir, 2, 3);

        let summary = crawler.run_scan(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.outcome, ScanOutcome::Completed);
        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.paths_abandoned, 0);
        assert_eq!(recorder.ids("job").len(), 2);

        let checkpoint = CheckpointStore::new(dir.path()).read("job").unwrap().unwrap();
        assert_eq!(checkpoint.state, CrawlState::Completed);
        assert!(checkpoint.is_completed("/r/bad"));
        assert_eq!(checkpoint.retry_count, 0);
    }

    #[tokio::test]
    async fn test_path_abandoned_after_max_retries() {
        let dir = TempDir::new().unwrap();
        let (mut crawler, recorder) = crawler(&dir, 10, 2);

        let summary = crawler.run_scan(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.outcome, ScanOutcome::Completed);
        assert_eq!(summary.paths_abandoned, 1);
        assert_eq!(summary.files_processed, 1);
        assert_eq!(recorder.ids("job"), vec![path_id("/a.txt")]);

        let checkpoint = CheckpointStore::new(dir.path()).read("job").unwrap().unwrap();
        assert!(!checkpoint.is_completed("/r/bad"));
        assert!(checkpoint
            .last_error
            .as_deref()
            .is_some_and(|e| e.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_checkpoint_write_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        // A directory in place of the temporary file makes every write fail
        std::fs::create_dir_all(dir.path().join("job").join("_checkpoint.json.tmp")).unwrap();
        let (mut crawler, recorder) = crawler(&dir, 0, 3);

        let result = crawler.run_scan(&CancellationToken::new()).await;
        assert!(matches!(result, Err(OrchestratorError::Checkpoint(_))));
        assert!(recorder.ids("job").is_empty());
        assert!(CheckpointStore::new(dir.path()).read("job").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_keeps_pending_work() {
        let dir = TempDir::new().unwrap();
        let (mut crawler, _recorder) = crawler(&dir, 0, 3);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = crawler.run_scan(&cancel).await.unwrap();
        assert_eq!(summary.outcome, ScanOutcome::Cancelled);

        let checkpoint = CheckpointStore::new(dir.path()).read("job").unwrap().unwrap();
        assert!(checkpoint.is_resumable());
        assert_eq!(checkpoint.peek_next_path(), Some("/r"));
    }

    #[tokio::test]
    async fn test_paused_job_does_not_crawl() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let mut paused = CrawlCheckpoint::new_checkpoint("/r");
        paused.pause();
        store.write("job", &paused).unwrap();

        let (mut crawler, recorder) = crawler(&dir, 0, 3);
        let summary = crawler.run_scan(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.outcome, ScanOutcome::Paused);
        assert!(recorder.ids("job").is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let path = store.checkpoint_path("job").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();

        let (mut crawler, _recorder) = crawler(&dir, 0, 3);
        let summary = crawler.run_scan(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.outcome, ScanOutcome::Completed);
        assert_eq!(summary.files_processed, 2);
    }

    #[tokio::test]
    async fn test_run_once() {
        let dir = TempDir::new().unwrap();
        let (mut crawler, recorder) = crawler(&dir, 0, 3);
        crawler.run(&CancellationToken::new(), Some(1)).await.unwrap();
        assert_eq!(recorder.ids("job").len(), 2);
    }
}
