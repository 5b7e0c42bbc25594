//! Document crawler CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (start, status, pause, resume, restart)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    pause_crawler, restart_crawler, resume_crawler, show_status, start_crawler, StartOptions,
};
