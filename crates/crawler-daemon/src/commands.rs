//! Command implementations for the crawler.
//!
//! Handles:
//! - start: Load settings, connect the backend and Elasticsearch, crawl
//! - status: Print the persisted checkpoint of a job
//! - pause / resume / restart: Change the persisted state of a job

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crawler_bulk::{default_listener, BulkProcessor, BulkProcessorConfig};
use crawler_checkpoint::CheckpointStore;
use crawler_client::ElasticClient;
use crawler_fs::{FileAbstractor, LocalFileAbstractor};
use crawler_orchestrator::{job_status, pause_job, restart_job, resume_job, Crawler};
use crawler_types::{ElasticsearchSettings, Protocol, Settings};

/// Options of the `start` command.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub job: String,
    pub config_path: Option<String>,
    pub log_level: Option<String>,
    pub loop_count: Option<u32>,
    pub restart: bool,
    pub root: Option<String>,
}

fn load_settings(job: &str, config_path: Option<&str>) -> Result<Settings> {
    Settings::load(job, config_path).context("Failed to load configuration")
}

fn checkpoint_store(settings: &Settings) -> CheckpointStore {
    CheckpointStore::new(settings.expanded_config_dir())
}

/// Apply CLI overrides (highest precedence).
fn apply_overrides(settings: &mut Settings, options: &StartOptions) {
    if let Some(root) = &options.root {
        settings.fs.url = root.clone();
    }
    if let Some(log_level) = &options.log_level {
        settings.log_level = log_level.clone();
    }
}

fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Bulk engine settings derived from the Elasticsearch section.
fn processor_config(settings: &ElasticsearchSettings) -> BulkProcessorConfig {
    let config = BulkProcessorConfig::default().with_bulk_actions(settings.bulk_size);
    if settings.flush_interval_ms == 0 {
        config.without_flush_interval()
    } else {
        config.with_flush_interval(Duration::from_millis(settings.flush_interval_ms))
    }
}

fn file_backend(settings: &Settings) -> Result<Box<dyn FileAbstractor>> {
    let local = || -> Box<dyn FileAbstractor> {
        Box::new(
            LocalFileAbstractor::new(&settings.fs.url)
                .with_follow_symlinks(settings.fs.follow_symlinks),
        )
    };
    match &settings.server {
        None => Ok(local()),
        Some(server) if server.protocol == Protocol::Local => Ok(local()),
        #[cfg(feature = "ssh")]
        Some(server) => Ok(Box::new(crawler_fs::SshFileAbstractor::new(
            &settings.fs.url,
            server.clone(),
        ))),
        #[cfg(not(feature = "ssh"))]
        Some(_) => anyhow::bail!("SSH backend not available, rebuild with the `ssh` feature"),
    }
}

/// Resolves once Ctrl+C or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Start crawling.
///
/// 1. Load settings (defaults -> job file -> --config -> env -> CLI)
/// 2. Connect Elasticsearch and create the indices
/// 3. Open the file backend
/// 4. Scan until the requested number of runs is done or a shutdown signal
///    arrives, then drain the bulk engine
pub async fn start_crawler(options: StartOptions) -> Result<()> {
    let mut settings = load_settings(&options.job, options.config_path.as_deref())?;
    apply_overrides(&mut settings, &options);

    init_logging(&settings.log_level)?;

    info!("Document crawler starting...");
    info!("Configuration:");
    info!("  Job: {}", settings.job_name);
    info!("  Root: {}", settings.fs.url);
    info!("  Elasticsearch: {}", settings.elasticsearch.url);
    info!("  Index: {}", settings.index_name());
    info!("  Log level: {}", settings.log_level);

    let store = checkpoint_store(&settings);
    if options.restart {
        restart_job(&store, &settings.job_name).context("Failed to discard checkpoint")?;
    }

    let client = Arc::new(
        ElasticClient::new(&settings.elasticsearch).context("Failed to create Elasticsearch client")?,
    );
    client.ping().await.context("Elasticsearch is not reachable")?;
    client
        .ensure_index(&settings.index_name())
        .await
        .context("Failed to create index")?;
    if settings.fs.index_folders {
        client
            .ensure_index(&settings.folder_index_name())
            .await
            .context("Failed to create folder index")?;
    }

    let processor = Arc::new(BulkProcessor::new(
        processor_config(&settings.elasticsearch),
        client.clone(),
        default_listener(settings.elasticsearch.retryable_errors.clone()),
    ));

    let mut crawler = Crawler::new(&settings, file_backend(&settings)?, store, processor.clone())
        .context("Invalid crawl settings")?;
    if settings.fs.remove_deleted {
        crawler = crawler.with_indexed_documents(client.clone());
    }
    crawler.open().await.context("Failed to open file backend")?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let result = crawler.run(&cancel, options.loop_count).await;

    // Cleanup
    processor.close().await;
    if let Err(e) = crawler.close().await {
        warn!(error = %e, "Failed to close file backend");
    }

    result.context("Crawl failed")?;
    info!("Document crawler stopped");
    Ok(())
}

/// Print the persisted progress of `job`.
pub fn show_status(job: &str, config_path: Option<&str>) -> Result<()> {
    let settings = load_settings(job, config_path)?;
    let store = checkpoint_store(&settings);

    match job_status(&store, &settings.job_name).context("Failed to read checkpoint")? {
        Some(checkpoint) => {
            println!("Job {}: {}", settings.job_name, checkpoint.state);
            println!("  Scan id: {}", checkpoint.scan_id);
            if let Some(start) = checkpoint.scan_start_time {
                println!("  Scan started: {}", start.to_rfc3339());
            }
            if let Some(date) = checkpoint.scan_date {
                println!("  Last completed scan: {}", date.to_rfc3339());
            }
            if let Some(current) = &checkpoint.current_path {
                println!("  Current path: {}", current);
            }
            println!("  Pending paths: {}", checkpoint.pending_paths.len());
            println!("  Completed paths: {}", checkpoint.completed_paths.len());
            println!("  Files processed: {}", checkpoint.files_processed);
            println!("  Files deleted: {}", checkpoint.files_deleted);
            if let Some(error) = &checkpoint.last_error {
                println!("  Last error: {}", error);
            }
        }
        None => println!("Job {} has never run", settings.job_name),
    }
    Ok(())
}

pub fn pause_crawler(job: &str, config_path: Option<&str>) -> Result<()> {
    let settings = load_settings(job, config_path)?;
    let state = pause_job(&checkpoint_store(&settings), &settings.job_name)
        .context("Failed to pause job")?;
    println!("Job {} is {}", settings.job_name, state);
    Ok(())
}

pub fn resume_crawler(job: &str, config_path: Option<&str>) -> Result<()> {
    let settings = load_settings(job, config_path)?;
    let state = resume_job(&checkpoint_store(&settings), &settings.job_name)
        .context("Failed to resume job")?;
    println!("Job {} is {}", settings.job_name, state);
    Ok(())
}

pub fn restart_crawler(job: &str, config_path: Option<&str>) -> Result<()> {
    let settings = load_settings(job, config_path)?;
    restart_job(&checkpoint_store(&settings), &settings.job_name)
        .context("Failed to discard checkpoint")?;
    println!("Job {} will start from scratch on its next run", settings.job_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_config() {
        let es = ElasticsearchSettings {
            bulk_size: 50,
            flush_interval_ms: 2_000,
            ..Default::default()
        };
        let config = processor_config(&es);
        assert_eq!(config.bulk_actions, 50);
        assert_eq!(config.flush_interval, Some(Duration::from_secs(2)));

        let es = ElasticsearchSettings {
            flush_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(processor_config(&es).flush_interval, None);
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut settings = Settings::default();
        let options = StartOptions {
            job: "docs".to_string(),
            log_level: Some("debug".to_string()),
            root: Some("/srv/docs".to_string()),
            ..Default::default()
        };
        apply_overrides(&mut settings, &options);
        assert_eq!(settings.fs.url, "/srv/docs");
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_local_backend_by_default() {
        let mut settings = Settings::default();
        settings.fs.url = "/srv/docs".to_string();
        let backend = file_backend(&settings).unwrap();
        assert_eq!(backend.name(), "local");
        assert_eq!(backend.root(), "/srv/docs");
    }
}
