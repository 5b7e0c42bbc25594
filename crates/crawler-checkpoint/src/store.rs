//! File persistence for crawl checkpoints.
//!
//! One JSON file per job at `<base_dir>/<job_name>/_checkpoint.json`,
//! overwritten wholesale on every write. Writes go to a temporary sibling
//! file which is then renamed over the target, so readers only ever see a
//! complete checkpoint.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::checkpoint::CrawlCheckpoint;
use crate::error::CheckpointError;

const CHECKPOINT_FILE: &str = "_checkpoint.json";
const TEMP_SUFFIX: &str = ".tmp";

/// Reads and writes checkpoints below a base directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    base_dir: PathBuf,
}

impl CheckpointStore {
    /// Create a store rooted at `base_dir` (created lazily on first write).
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Location of the checkpoint file for `job_name`.
    pub fn checkpoint_path(&self, job_name: &str) -> Result<PathBuf, CheckpointError> {
        validate_job_name(job_name)?;
        Ok(self.base_dir.join(job_name).join(CHECKPOINT_FILE))
    }

    /// Read the checkpoint of `job_name`.
    ///
    /// Returns `Ok(None)` when no checkpoint exists, and
    /// [`CheckpointError::Unreadable`] when the file exists but is corrupt.
    pub fn read(&self, job_name: &str) -> Result<Option<CrawlCheckpoint>, CheckpointError> {
        let path = self.checkpoint_path(job_name)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(job = %job_name, "No existing checkpoint");
                return Ok(None);
            }
            Err(e) => return Err(CheckpointError::io(path, e)),
        };

        let checkpoint = CrawlCheckpoint::from_bytes(&bytes).map_err(|e| {
            CheckpointError::Unreadable {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        debug!(
            job = %job_name,
            scan_id = %checkpoint.scan_id,
            state = %checkpoint.state,
            pending = checkpoint.pending_paths.len(),
            "Loaded checkpoint"
        );
        Ok(Some(checkpoint))
    }

    /// Atomically replace the checkpoint of `job_name`.
    pub fn write(&self, job_name: &str, checkpoint: &CrawlCheckpoint) -> Result<(), CheckpointError> {
        let path = self.checkpoint_path(job_name)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone());
        fs::create_dir_all(&dir).map_err(|e| CheckpointError::io(&dir, e))?;

        let bytes = checkpoint.to_bytes()?;
        let tmp_path = dir.join(format!("{}{}", CHECKPOINT_FILE, TEMP_SUFFIX));

        {
            let mut file = fs::File::create(&tmp_path).map_err(|e| CheckpointError::io(&tmp_path, e))?;
            file.write_all(&bytes)
                .map_err(|e| CheckpointError::io(&tmp_path, e))?;
            file.sync_all()
                .map_err(|e| CheckpointError::io(&tmp_path, e))?;
        }

        fs::rename(&tmp_path, &path).map_err(|e| CheckpointError::io(&path, e))?;

        debug!(
            job = %job_name,
            state = %checkpoint.state,
            processed = checkpoint.files_processed,
            "Saved checkpoint"
        );
        Ok(())
    }

    /// True when a checkpoint file exists for `job_name`.
    pub fn exists(&self, job_name: &str) -> bool {
        self.checkpoint_path(job_name)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Delete the checkpoint of `job_name`; a missing checkpoint is not an error.
    pub fn clean(&self, job_name: &str) -> Result<(), CheckpointError> {
        let path = self.checkpoint_path(job_name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(job = %job_name, "Removed checkpoint");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::io(path, e)),
        }
    }
}

fn validate_job_name(job_name: &str) -> Result<(), CheckpointError> {
    let invalid = job_name.trim().is_empty()
        || job_name == "."
        || job_name == ".."
        || job_name.contains(['/', '\\']);
    if invalid {
        return Err(CheckpointError::InvalidJobName(job_name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (CheckpointStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        (CheckpointStore::new(temp_dir.path()), temp_dir)
    }

    #[test]
    fn test_read_missing_returns_none() {
        let (store, _temp) = create_test_store();
        assert!(store.read("docs").unwrap().is_none());
        assert!(!store.exists("docs"));
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (store, _temp) = create_test_store();
        let mut checkpoint = CrawlCheckpoint::new_checkpoint("/data");
        checkpoint.poll_next_path();
        checkpoint.add_path("/data/sub");
        checkpoint.mark_completed("/data");
        checkpoint.increment_files_processed();

        store.write("docs", &checkpoint).unwrap();
        assert!(store.exists("docs"));

        let loaded = store.read("docs").unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
    }

    #[test]
    fn test_write_overwrites_and_leaves_no_temp_file() {
        let (store, temp) = create_test_store();
        let mut checkpoint = CrawlCheckpoint::new_checkpoint("/data");
        store.write("docs", &checkpoint).unwrap();

        checkpoint.increment_files_processed();
        store.write("docs", &checkpoint).unwrap();

        let loaded = store.read("docs").unwrap().unwrap();
        assert_eq!(loaded.files_processed, 1);

        let entries: Vec<_> = fs::read_dir(temp.path().join("docs"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec![CHECKPOINT_FILE.to_string()]);
    }

    #[test]
    fn test_corrupt_file_is_unreadable() {
        let (store, _temp) = create_test_store();
        let path = store.checkpoint_path("docs").unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{\"scan_id\": \"abc\", \"pending_pa").unwrap();

        let err = store.read("docs").unwrap_err();
        assert!(err.is_unreadable());
        assert!(store.exists("docs"));
    }

    #[test]
    fn test_clean() {
        let (store, _temp) = create_test_store();
        // Cleaning a missing checkpoint is a no-op
        store.clean("docs").unwrap();

        store
            .write("docs", &CrawlCheckpoint::new_checkpoint("/data"))
            .unwrap();
        store.clean("docs").unwrap();
        assert!(!store.exists("docs"));
        assert!(store.read("docs").unwrap().is_none());
    }

    #[test]
    fn test_jobs_are_isolated() {
        let (store, _temp) = create_test_store();
        store
            .write("a", &CrawlCheckpoint::new_checkpoint("/a"))
            .unwrap();
        assert!(store.exists("a"));
        assert!(!store.exists("b"));
    }

    #[test]
    fn test_invalid_job_names() {
        let (store, _temp) = create_test_store();
        for name in ["", " ", "..", "a/b", "a\\b"] {
            assert!(matches!(
                store.read(name),
                Err(CheckpointError::InvalidJobName(_))
            ));
        }
        assert!(!store.exists("../escape"));
    }
}
