//! CLI argument parsing for the crawler.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// Resumable document crawler
///
/// Walks a directory tree and ships its files to Elasticsearch.
#[derive(Parser, Debug)]
#[command(name = "doc-crawler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a settings file (merged over <config_dir>/<job>/_settings)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Crawler commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a crawl job until interrupted
    Start {
        /// Job name
        #[arg(default_value = "crawler")]
        job: String,

        /// Stop after this many completed scans
        #[arg(long = "loop", value_parser = clap::value_parser!(u32).range(1..))]
        loop_count: Option<u32>,

        /// Discard the checkpoint and start from scratch
        #[arg(long)]
        restart: bool,

        /// Override the directory to crawl
        #[arg(long)]
        root: Option<String>,
    },

    /// Show the persisted progress of a job
    Status {
        #[arg(default_value = "crawler")]
        job: String,
    },

    /// Pause a job; a running crawler stops before its next directory
    Pause {
        #[arg(default_value = "crawler")]
        job: String,
    },

    /// Resume a paused job
    Resume {
        #[arg(default_value = "crawler")]
        job: String,
    },

    /// Discard all progress of a job
    Restart {
        #[arg(default_value = "crawler")]
        job: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
