//! Configuration loading for drop-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`).
//! Every section and every field is optional.

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration for drop-relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Rate limiting configuration.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// HTTP server configuration.
    #[serde(default)]
    pub http: HttpConfig,
    /// Cleanup task configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// Password hashing configuration.
    #[serde(default)]
    pub passwords: PasswordConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
    /// Maximum upload request body in bytes (default: 128MB).
    ///
    /// The body is base64 JSON, roughly 4/3 of the ciphertext size, so the
    /// default admits files just under 96MB. This is deliberately far below
    /// the 5GB protocol maximum; larger uploads get 413 until an operator
    /// raises it.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Uploads per client IP per minute (default: 10).
    #[serde(default = "default_uploads_per_minute")]
    pub uploads_per_minute: u32,
    /// Download attempts per client IP per minute (default: 60).
    #[serde(default = "default_downloads_per_minute")]
    pub downloads_per_minute: u32,
    /// Requests per second across all clients (default: 100).
    #[serde(default = "default_global_requests_per_second")]
    pub global_requests_per_second: u32,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Bind address for HTTP server (default: 0.0.0.0:8080).
    #[serde(default = "default_http_bind")]
    pub bind_address: String,
    /// Enable metrics endpoint (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

/// Cleanup task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Cleanup interval in seconds (default: 300 = 5 minutes).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Enable cleanup task (default: true).
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
}

/// Argon2id cost parameters for share passwords.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    /// Memory cost in MiB (default: 19).
    #[serde(default = "default_password_memory_mib")]
    pub memory_mib: u32,
    /// Iterations (default: 2).
    #[serde(default = "default_password_iterations")]
    pub iterations: u32,
    /// Lanes (default: 1).
    #[serde(default = "default_password_parallelism")]
    pub parallelism: u32,
}

// Default value functions
fn default_database_path() -> PathBuf {
    PathBuf::from("drop.db")
}

fn default_max_body_bytes() -> usize {
    128 * 1024 * 1024 // 128MB
}

fn default_uploads_per_minute() -> u32 {
    10
}

fn default_downloads_per_minute() -> u32 {
    60
}

fn default_global_requests_per_second() -> u32 {
    100
}

fn default_http_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_cleanup_interval() -> u64 {
    300 // 5 minutes
}

fn default_cleanup_enabled() -> bool {
    true
}

fn default_password_memory_mib() -> u32 {
    19
}

fn default_password_iterations() -> u32 {
    2
}

fn default_password_parallelism() -> u32 {
    1
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            uploads_per_minute: default_uploads_per_minute(),
            downloads_per_minute: default_downloads_per_minute(),
            global_requests_per_second: default_global_requests_per_second(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_http_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            enabled: default_cleanup_enabled(),
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_mib: default_password_memory_mib(),
            iterations: default_password_iterations(),
            parallelism: default_password_parallelism(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
