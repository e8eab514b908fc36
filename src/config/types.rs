// Configuration types module
// Typed view of the config file sections

use serde::Deserialize;

/// Top-level configuration, one field per file section
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Storage backend selector
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Directory tree on the local filesystem
    Fs,
    /// Process-local, lost on restart
    Memory,
}

/// Storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageKind,
    /// Root directory for the `fs` backend (ignored by `memory`)
    pub root: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub access_log: bool,
    /// Access log format (combined, common, json)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log path; stdout when unset
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log path; stderr when unset
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Connection tuning knobs, all in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub max_body_size: u64,
}
