//! Checkpoint state for one crawl job.
//!
//! The checkpoint is a small state machine: a pending-path queue (FIFO with
//! priority insertion at the head), the set of paths completed in the current
//! scan, counters, and the job lifecycle state.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrawlState {
    /// Scan in progress (also while retrying the current path)
    #[default]
    Running,
    /// Scan suspended by the operator
    Paused,
    /// Last scan finished, waiting for the next one
    Completed,
    /// Scan stopped on a fatal error
    Failed,
}

impl std::fmt::Display for CrawlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlState::Running => write!(f, "running"),
            CrawlState::Paused => write!(f, "paused"),
            CrawlState::Completed => write!(f, "completed"),
            CrawlState::Failed => write!(f, "failed"),
        }
    }
}

/// Progress of a crawl, persisted after every meaningful transition.
///
/// Invariants:
/// - a completed path is never queued again within the same `scan_id`
/// - `pending_paths` holds no duplicates
/// - `retry_count` is reset when a path succeeds or a different path becomes current
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CrawlCheckpoint {
    /// Opaque token, regenerated for every full scan
    pub scan_id: String,

    /// When the current scan started
    pub scan_start_time: Option<DateTime<Utc>>,

    /// Start time of the last completed scan
    pub scan_date: Option<DateTime<Utc>>,

    /// Path being processed, if any
    pub current_path: Option<String>,

    /// Paths not visited yet, head first
    pub pending_paths: VecDeque<String>,

    /// Paths fully processed in the current scan
    pub completed_paths: BTreeSet<String>,

    pub files_processed: u64,

    pub files_deleted: u64,

    pub state: CrawlState,

    /// Consecutive failures of the current path
    pub retry_count: u32,

    pub last_error: Option<String>,
}

impl CrawlCheckpoint {
    /// Create a checkpoint for a fresh scan of `root_path`.
    pub fn new_checkpoint(root_path: impl Into<String>) -> Self {
        Self {
            scan_id: ulid::Ulid::new().to_string(),
            scan_start_time: Some(Utc::now()),
            pending_paths: VecDeque::from([root_path.into()]),
            state: CrawlState::Running,
            ..Default::default()
        }
    }

    /// Start the next scan of `root_path`, carrying over the last scan date.
    pub fn next_scan(&self, root_path: impl Into<String>) -> Self {
        Self {
            scan_date: self.scan_date,
            ..Self::new_checkpoint(root_path)
        }
    }

    /// True iff paths remain to be visited.
    pub fn has_pending_work(&self) -> bool {
        !self.pending_paths.is_empty()
    }

    /// Head of the queue, without removing it.
    pub fn peek_next_path(&self) -> Option<&str> {
        self.pending_paths.front().map(String::as_str)
    }

    /// Remove the head of the queue and make it the current path.
    pub fn poll_next_path(&mut self) -> Option<String> {
        let path = self.pending_paths.pop_front()?;
        if self.current_path.as_deref() != Some(path.as_str()) {
            self.retry_count = 0;
        }
        self.current_path = Some(path.clone());
        Some(path)
    }

    /// Queue `path` at the tail.
    ///
    /// Returns false when the path is already pending or completed.
    pub fn add_path(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.completed_paths.contains(&path) || self.pending_paths.contains(&path) {
            return false;
        }
        self.pending_paths.push_back(path);
        true
    }

    /// Queue `path` at the head, ahead of its siblings.
    ///
    /// A path already pending is moved to the head. Completed paths are
    /// never re-queued; returns false in that case.
    pub fn add_path_first(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.completed_paths.contains(&path) {
            return false;
        }
        self.pending_paths.retain(|p| p != &path);
        self.pending_paths.push_front(path);
        true
    }

    /// Record `path` as fully processed. Idempotent.
    pub fn mark_completed(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.pending_paths.retain(|p| p != &path);
        if self.current_path.as_deref() == Some(path.as_str()) {
            self.current_path = None;
            self.retry_count = 0;
        }
        self.completed_paths.insert(path);
    }

    pub fn is_completed(&self, path: &str) -> bool {
        self.completed_paths.contains(path)
    }

    pub fn increment_files_processed(&mut self) {
        self.files_processed += 1;
    }

    pub fn increment_files_deleted(&mut self) {
        self.files_deleted += 1;
    }

    /// Count one more failure of the current path and return the new count.
    pub fn increment_retry_count(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }

    pub fn reset_retry_count(&mut self) {
        self.retry_count = 0;
    }

    /// Remember the last error seen by the crawl.
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Give up on the current path: it is dropped without being completed.
    pub fn abandon_current(&mut self, error: impl Into<String>) {
        if let Some(path) = self.current_path.take() {
            self.pending_paths.retain(|p| p != &path);
        }
        self.retry_count = 0;
        self.record_error(error);
    }

    pub fn pause(&mut self) {
        if self.state == CrawlState::Running {
            self.state = CrawlState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == CrawlState::Paused {
            self.state = CrawlState::Running;
        }
    }

    /// Finish the scan: the scan start becomes the reference date for the
    /// next incremental scan.
    pub fn complete(&mut self) {
        self.state = CrawlState::Completed;
        self.current_path = None;
        self.retry_count = 0;
        self.scan_date = self.scan_start_time.or_else(|| Some(Utc::now()));
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = CrawlState::Failed;
        self.record_error(error);
    }

    /// True when the checkpoint describes an unfinished scan worth resuming.
    pub fn is_resumable(&self) -> bool {
        matches!(self.state, CrawlState::Running | CrawlState::Paused)
            && (self.has_pending_work() || self.current_path.is_some())
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, crate::CheckpointError> {
        serde_json::to_vec_pretty(self).map_err(crate::CheckpointError::from)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::CheckpointError> {
        serde_json::from_slice(bytes).map_err(crate::CheckpointError::from)
    }
}
