//! Job lifecycle E2E tests: resume after interruption, pause, restart.

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use crawler_checkpoint::{CrawlCheckpoint, CrawlState};
use crawler_orchestrator::{job_status, pause_job, restart_job, resume_job, ScanOutcome};
use e2e_tests::TestHarness;

fn sample_tree(harness: &TestHarness) {
    harness.write_file("a.txt", "alpha");
    harness.write_file("sub/b.md", "# beta");
    harness.write_file("sub/deep/c.txt", "gamma");
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Checkpoint of a scan that stopped after the root directory.
fn interrupted_after_root(harness: &TestHarness) -> CrawlCheckpoint {
    let mut checkpoint = CrawlCheckpoint::new_checkpoint(harness.path(""));
    let root = checkpoint.poll_next_path().unwrap();
    checkpoint.add_path(harness.path("sub"));
    checkpoint.increment_files_processed();
    checkpoint.mark_completed(root);
    checkpoint
}

#[tokio::test]
async fn test_resume_skips_completed_directories() {
    let harness = TestHarness::new();
    sample_tree(&harness);
    let checkpoint = interrupted_after_root(&harness);
    harness.checkpoint_store().write("e2e", &checkpoint).unwrap();

    let summary = harness.scan().await;
    assert_eq!(summary.outcome, ScanOutcome::Completed);
    assert_eq!(summary.scan_id, checkpoint.scan_id);
    // One file counted before the interruption, two after
    assert_eq!(summary.files_processed, 3);
    assert_eq!(
        harness.store.virtual_paths(&harness.index()),
        strings(&["/sub/b.md", "/sub/deep/c.txt"])
    );
}

#[tokio::test]
async fn test_resume_reprocesses_interrupted_directory() {
    let harness = TestHarness::new();
    sample_tree(&harness);

    // Crashed while listing the root
    let mut checkpoint = CrawlCheckpoint::new_checkpoint(harness.path(""));
    checkpoint.poll_next_path();
    assert!(!checkpoint.has_pending_work());
    harness.checkpoint_store().write("e2e", &checkpoint).unwrap();

    let summary = harness.scan().await;
    assert_eq!(summary.outcome, ScanOutcome::Completed);
    assert_eq!(summary.scan_id, checkpoint.scan_id);
    assert_eq!(
        harness.store.virtual_paths(&harness.index()),
        strings(&["/a.txt", "/sub/b.md", "/sub/deep/c.txt"])
    );
}

#[tokio::test]
async fn test_cancelled_scan_resumes_later() {
    let harness = TestHarness::new();
    sample_tree(&harness);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let first = harness.scan_with(&cancel).await;
    assert_eq!(first.outcome, ScanOutcome::Cancelled);
    assert!(harness.store.virtual_paths(&harness.index()).is_empty());

    let persisted = harness.checkpoint_store().read("e2e").unwrap().unwrap();
    assert_eq!(persisted.state, CrawlState::Running);
    assert!(persisted.is_resumable());

    let second = harness.scan().await;
    assert_eq!(second.outcome, ScanOutcome::Completed);
    assert_eq!(second.scan_id, first.scan_id);
    assert_eq!(second.files_processed, 3);
}

#[tokio::test]
async fn test_paused_job_does_not_crawl() {
    let harness = TestHarness::new();
    sample_tree(&harness);
    let store = harness.checkpoint_store();

    let cancel = CancellationToken::new();
    cancel.cancel();
    harness.scan_with(&cancel).await;

    assert_eq!(pause_job(&store, "e2e").unwrap(), CrawlState::Paused);
    let paused = harness.scan().await;
    assert_eq!(paused.outcome, ScanOutcome::Paused);
    assert!(harness.store.virtual_paths(&harness.index()).is_empty());

    assert_eq!(resume_job(&store, "e2e").unwrap(), CrawlState::Running);
    let resumed = harness.scan().await;
    assert_eq!(resumed.outcome, ScanOutcome::Completed);
    assert_eq!(resumed.scan_id, paused.scan_id);
    assert_eq!(harness.store.virtual_paths(&harness.index()).len(), 3);
}

#[tokio::test]
async fn test_restart_discards_progress() {
    let harness = TestHarness::new();
    sample_tree(&harness);
    let checkpoint = interrupted_after_root(&harness);
    let store = harness.checkpoint_store();
    store.write("e2e", &checkpoint).unwrap();

    restart_job(&store, "e2e").unwrap();
    assert!(job_status(&store, "e2e").unwrap().is_none());

    let summary = harness.scan().await;
    assert_ne!(summary.scan_id, checkpoint.scan_id);
    assert_eq!(summary.files_processed, 3);
    assert_eq!(
        harness.store.virtual_paths(&harness.index()),
        strings(&["/a.txt", "/sub/b.md", "/sub/deep/c.txt"])
    );
}

#[tokio::test]
async fn test_completed_job_starts_incremental_scan() {
    let harness = TestHarness::new();
    sample_tree(&harness);
    harness.scan().await;

    let completed = job_status(&harness.checkpoint_store(), "e2e")
        .unwrap()
        .unwrap();
    assert_eq!(completed.state, CrawlState::Completed);

    let next = harness.scan().await;
    assert_ne!(next.scan_id, completed.scan_id);
    let persisted = job_status(&harness.checkpoint_store(), "e2e")
        .unwrap()
        .unwrap();
    assert!(persisted.scan_date > completed.scan_date);
}
