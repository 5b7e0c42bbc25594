//! # crawler-orchestrator
//!
//! Drives a crawl job: walks the tree through a [`crawler_fs::FileAbstractor`],
//! records progress in a [`crawler_checkpoint::CrawlCheckpoint`], and feeds
//! index/delete operations to a [`crawler_bulk::BulkProcessor`].
//!
//! ## Core Components
//!
//! - [`Crawler`]: Scan loop with resume, retry and incremental re-scan
//! - [`ContentExtractor`]: Pluggable text extraction, [`PlainTextExtractor`] by default
//! - Job control: [`pause_job`], [`resume_job`], [`restart_job`], [`job_status`]

pub mod control;
pub mod crawler;
pub mod error;
pub mod extract;

pub use control::{job_status, pause_job, restart_job, resume_job};
pub use crawler::{Crawler, ScanOutcome, ScanSummary};
pub use error::OrchestratorError;
pub use extract::{ContentExtractor, PlainTextExtractor};
