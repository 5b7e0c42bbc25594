//! Operator commands acting on a job's persisted checkpoint.

use tracing::info;

use crawler_checkpoint::{CheckpointStore, CrawlCheckpoint, CrawlState};

use crate::error::OrchestratorError;

/// Current checkpoint of `job_name`, if it ever ran.
pub fn job_status(
    store: &CheckpointStore,
    job_name: &str,
) -> Result<Option<CrawlCheckpoint>, OrchestratorError> {
    Ok(store.read(job_name)?)
}

/// Suspend a running job. A running crawler stops before its next path.
pub fn pause_job(store: &CheckpointStore, job_name: &str) -> Result<CrawlState, OrchestratorError> {
    update_state(store, job_name, CrawlCheckpoint::pause)
}

/// Let a paused job continue where it stopped.
pub fn resume_job(store: &CheckpointStore, job_name: &str) -> Result<CrawlState, OrchestratorError> {
    update_state(store, job_name, CrawlCheckpoint::resume)
}

/// Discard all progress of `job_name`; the next run is a full first scan.
pub fn restart_job(store: &CheckpointStore, job_name: &str) -> Result<(), OrchestratorError> {
    store.clean(job_name)?;
    info!(job = %job_name, "Checkpoint removed, next run starts from scratch");
    Ok(())
}

fn update_state(
    store: &CheckpointStore,
    job_name: &str,
    transition: fn(&mut CrawlCheckpoint),
) -> Result<CrawlState, OrchestratorError> {
    let mut checkpoint = store
        .read(job_name)?
        .ok_or_else(|| OrchestratorError::NoCheckpoint(job_name.to_string()))?;
    let before = checkpoint.state;
    transition(&mut checkpoint);
    if checkpoint.state != before {
        store.write(job_name, &checkpoint)?;
        info!(job = %job_name, from = %before, to = %checkpoint.state, "Job state changed");
    }
    Ok(checkpoint.state)
}
