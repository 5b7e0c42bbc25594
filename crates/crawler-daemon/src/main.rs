//! Document crawler
//!
//! Crawls a directory tree, locally or over SFTP, into Elasticsearch and
//! resumes where it stopped after a crash or shutdown.
//!
//! # Usage
//!
//! ```bash
//! doc-crawler start [JOB] [--loop N] [--restart] [--root PATH]
//! doc-crawler status [JOB]
//! doc-crawler pause [JOB]
//! doc-crawler resume [JOB]
//! doc-crawler restart [JOB]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Job settings file (<config_dir>/<job>/_settings.{toml,yaml,json})
//! 3. File given with --config
//! 4. Environment variables (CRAWLER_*)
//! 5. CLI flags

use anyhow::Result;

use crawler_daemon::{
    pause_crawler, restart_crawler, resume_crawler, show_status, start_crawler, Cli, Commands,
    StartOptions,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Start {
            job,
            loop_count,
            restart,
            root,
        } => {
            start_crawler(StartOptions {
                job,
                config_path: cli.config,
                log_level: cli.log_level,
                loop_count,
                restart,
                root,
            })
            .await?;
        }
        Commands::Status { job } => {
            show_status(&job, cli.config.as_deref())?;
        }
        Commands::Pause { job } => {
            pause_crawler(&job, cli.config.as_deref())?;
        }
        Commands::Resume { job } => {
            resume_crawler(&job, cli.config.as_deref())?;
        }
        Commands::Restart { job } => {
            restart_crawler(&job, cli.config.as_deref())?;
        }
    }

    Ok(())
}
