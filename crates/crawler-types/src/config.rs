//! Configuration loading for crawl jobs.
//!
//! Layered config: defaults -> job settings file -> CLI config file -> env vars.
//! CLI flags are applied by the caller after [`Settings::load`] returns.
//!
//! The default settings file for a job lives at
//! `<config_dir>/<job_name>/_settings.{toml,yaml,json}`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CrawlerError;

/// Settings for the crawled tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsSettings {
    /// Root path to crawl
    #[serde(default = "default_fs_url")]
    pub url: String,

    /// Seconds between two scans when running in a loop
    #[serde(default = "default_update_rate")]
    pub update_rate_secs: u64,

    /// Glob patterns a file must match to be indexed (empty = everything)
    #[serde(default)]
    pub includes: Vec<String>,

    /// Glob patterns that exclude files and directories
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    /// Index directories as folder documents
    #[serde(default = "default_true")]
    pub index_folders: bool,

    /// Delete documents whose file disappeared from the backend
    #[serde(default = "default_true")]
    pub remove_deleted: bool,

    /// Skip files larger than this many bytes
    #[serde(default)]
    pub ignore_above: Option<u64>,

    /// Maximum number of characters of extracted text to keep
    #[serde(default = "default_indexed_chars")]
    pub indexed_chars: Option<usize>,

    /// Store the file size in the document
    #[serde(default = "default_true")]
    pub add_filesize: bool,

    /// Use the file name as document id instead of a path digest
    #[serde(default)]
    pub filename_as_id: bool,

    /// Extract and index file content
    #[serde(default = "default_true")]
    pub index_content: bool,

    /// Attempts for a directory listing before the path is abandoned
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Descend into symbolic links; each target directory is visited once per scan
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_fs_url() -> String {
    "/tmp/es".to_string()
}

fn default_update_rate() -> u64 {
    15 * 60
}

fn default_excludes() -> Vec<String> {
    vec!["*/~*".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_indexed_chars() -> Option<usize> {
    Some(100_000)
}

fn default_max_retries() -> u32 {
    3
}

impl Default for FsSettings {
    fn default() -> Self {
        Self {
            url: default_fs_url(),
            update_rate_secs: default_update_rate(),
            includes: Vec::new(),
            excludes: default_excludes(),
            index_folders: true,
            remove_deleted: true,
            ignore_above: None,
            indexed_chars: default_indexed_chars(),
            add_filesize: true,
            filename_as_id: false,
            index_content: true,
            max_retries: default_max_retries(),
            follow_symlinks: false,
        }
    }
}

impl FsSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("fs.url must not be empty".to_string());
        }
        if self.update_rate_secs == 0 {
            return Err("fs.update_rate_secs must be > 0".to_string());
        }
        Ok(())
    }
}

/// Backend protocol used to reach the crawled tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Local disk (default)
    #[default]
    Local,
    /// SSH / SFTP
    Ssh,
}

/// Credentials for a remote backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub hostname: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    pub username: String,

    /// Password (prefer env var CRAWLER_SERVER__PASSWORD over the file)
    #[serde(default, skip_serializing)]
    pub password: Option<SecretString>,

    /// Path to a private key used instead of the password
    #[serde(default)]
    pub pem_path: Option<String>,

    #[serde(default)]
    pub protocol: Protocol,
}

fn default_ssh_port() -> u16 {
    22
}

impl ServerSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.hostname.trim().is_empty() {
            return Err("server.hostname must not be empty".to_string());
        }
        if self.password.is_none() && self.pem_path.is_none() {
            return Err("server needs either a password or a pem_path".to_string());
        }
        Ok(())
    }
}

/// Settings for the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchSettings {
    #[serde(default = "default_es_url")]
    pub url: String,

    /// Index for file documents (defaults to the job name)
    #[serde(default)]
    pub index: Option<String>,

    /// Index for folder documents (defaults to `<job name>_folder`)
    #[serde(default)]
    pub index_folder: Option<String>,

    /// Operations per bulk request
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,

    /// Interval of the background flush, 0 disables it
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    /// Error codes or message fragments that make a failed item retryable
    #[serde(default = "default_retryable_errors")]
    pub retryable_errors: Vec<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<SecretString>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_es_url() -> String {
    "http://127.0.0.1:9200".to_string()
}

fn default_bulk_size() -> usize {
    100
}

fn default_flush_interval() -> u64 {
    5_000
}

fn default_retryable_errors() -> Vec<String> {
    vec!["es_rejected_execution_exception".to_string()]
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ElasticsearchSettings {
    fn default() -> Self {
        Self {
            url: default_es_url(),
            index: None,
            index_folder: None,
            bulk_size: default_bulk_size(),
            flush_interval_ms: default_flush_interval(),
            retryable_errors: default_retryable_errors(),
            username: None,
            password: None,
            timeout_secs: default_request_timeout(),
        }
    }
}

impl ElasticsearchSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.bulk_size == 0 {
            return Err("elasticsearch.bulk_size must be > 0".to_string());
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(format!("elasticsearch.url must be http(s), got {}", self.url));
        }
        Ok(())
    }
}

/// Main job settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Name of the crawl job; keys the checkpoint and default indices
    #[serde(default = "default_job_name")]
    pub job_name: String,

    /// Directory holding per-job settings and checkpoints
    #[serde(default = "default_config_dir")]
    pub config_dir: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub fs: FsSettings,

    /// Remote backend; local disk when absent
    #[serde(default)]
    pub server: Option<ServerSettings>,

    #[serde(default)]
    pub elasticsearch: ElasticsearchSettings,
}

fn default_job_name() -> String {
    "crawler".to_string()
}

fn default_config_dir() -> String {
    ProjectDirs::from("", "", "doc-crawler")
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./.doc-crawler"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            job_name: default_job_name(),
            config_dir: default_config_dir(),
            log_level: default_log_level(),
            fs: FsSettings::default(),
            server: None,
            elasticsearch: ElasticsearchSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings for `job_name` with layered precedence:
    /// 1. Built-in defaults
    /// 2. Job settings file (`<config_dir>/<job_name>/_settings`)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (`CRAWLER_FS__URL`, `CRAWLER_ELASTICSEARCH__BULK_SIZE`, ...)
    pub fn load(job_name: &str, cli_config_path: Option<&str>) -> Result<Self, CrawlerError> {
        if job_name.trim().is_empty() {
            return Err(CrawlerError::InvalidInput("job name must not be empty".to_string()));
        }

        let config_dir = default_config_dir();
        let job_settings_path = PathBuf::from(&config_dir).join(job_name).join("_settings");

        let mut builder = Config::builder()
            .set_default("job_name", job_name)
            .map_err(|e| CrawlerError::Config(e.to_string()))?
            .set_default("config_dir", config_dir.clone())
            .map_err(|e| CrawlerError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| CrawlerError::Config(e.to_string()))?
            .add_source(File::with_name(&job_settings_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CRAWLER")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("fs.includes")
                .with_list_parse_key("fs.excludes")
                .with_list_parse_key("elasticsearch.retryable_errors")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| CrawlerError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| CrawlerError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), CrawlerError> {
        self.fs.validate().map_err(CrawlerError::Config)?;
        self.elasticsearch.validate().map_err(CrawlerError::Config)?;
        if let Some(server) = &self.server {
            server.validate().map_err(CrawlerError::Config)?;
        }
        Ok(())
    }

    /// Index receiving file documents.
    pub fn index_name(&self) -> String {
        self.elasticsearch
            .index
            .clone()
            .unwrap_or_else(|| self.job_name.clone())
    }

    /// Index receiving folder documents.
    pub fn folder_index_name(&self) -> String {
        self.elasticsearch
            .index_folder
            .clone()
            .unwrap_or_else(|| format!("{}_folder", self.job_name))
    }

    /// Expand `~` in config_dir to the home directory.
    pub fn expanded_config_dir(&self) -> PathBuf {
        if let Some(rest) = self.config_dir.strip_prefix("~/") {
            if let Some(dirs) = directories::BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.config_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.job_name, "crawler");
        assert_eq!(settings.fs.update_rate_secs, 900);
        assert_eq!(settings.fs.excludes, vec!["*/~*"]);
        assert_eq!(settings.elasticsearch.bulk_size, 100);
        assert!(settings.server.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_index_names() {
        let mut settings = Settings {
            job_name: "docs".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.index_name(), "docs");
        assert_eq!(settings.folder_index_name(), "docs_folder");

        settings.elasticsearch.index = Some("custom".to_string());
        assert_eq!(settings.index_name(), "custom");
    }

    #[test]
    fn test_load_with_cli_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(
            &path,
            r#"
            [fs]
            url = "/srv/share"
            includes = ["*.pdf"]

            [elasticsearch]
            bulk_size = 10
            "#,
        )
        .unwrap();

        let settings = Settings::load("docs", Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.job_name, "docs");
        assert_eq!(settings.fs.url, "/srv/share");
        assert_eq!(settings.fs.includes, vec!["*.pdf"]);
        assert_eq!(settings.elasticsearch.bulk_size, 10);
        assert_eq!(settings.elasticsearch.flush_interval_ms, 5_000);
    }

    #[test]
    fn test_load_rejects_empty_job_name() {
        assert!(matches!(
            Settings::load("  ", None),
            Err(CrawlerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validation() {
        let mut es = ElasticsearchSettings::default();
        assert!(es.validate().is_ok());
        es.bulk_size = 0;
        assert!(es.validate().is_err());

        let server = ServerSettings {
            hostname: "files.local".to_string(),
            port: 22,
            username: "crawler".to_string(),
            password: None,
            pem_path: None,
            protocol: Protocol::Ssh,
        };
        assert!(server.validate().is_err());
    }

    #[test]
    fn test_passwords_are_redacted() {
        use secrecy::ExposeSecret;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(
            &path,
            r#"
            [server]
            hostname = "files.local"
            username = "crawler"
            password = "hunter2"

            [elasticsearch]
            username = "elastic"
            password = "changeme"
            "#,
        )
        .unwrap();

        let settings = Settings::load("docs", Some(path.to_str().unwrap())).unwrap();
        let server = settings.server.as_ref().unwrap();
        assert_eq!(server.password.as_ref().unwrap().expose_secret(), "hunter2");
        assert_eq!(
            settings.elasticsearch.password.as_ref().unwrap().expose_secret(),
            "changeme"
        );

        let debug = format!("{:?}", settings);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("changeme"));
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("changeme"));
    }

    #[test]
    fn test_symlinks_not_followed_by_default() {
        assert!(!FsSettings::default().follow_symlinks);
    }

    #[test]
    fn test_protocol_serialization() {
        assert_eq!(serde_json::to_string(&Protocol::Ssh).unwrap(), "\"ssh\"");
        let parsed: Protocol = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(parsed, Protocol::Local);
    }
}
