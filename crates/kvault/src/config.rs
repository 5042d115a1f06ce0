//! Configuration loading

use anyhow::{Context, Result};
use kvault_storage::{BackendKind, StorageOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Encryption password; unset or empty stores plaintext blobs
    #[serde(default)]
    pub password: Option<String>,
    /// Hex-encoded key derivation salt
    #[serde(default)]
    pub salt: Option<String>,
    #[serde(default)]
    pub compression_level: Option<u32>,
    #[serde(default)]
    pub local: LocalStorageConfig,
    #[serde(default)]
    pub s3: S3StorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            password: None,
            salt: None,
            compression_level: None,
            local: LocalStorageConfig::default(),
            s3: S3StorageConfig::default(),
        }
    }
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_local_path")]
    pub path: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            path: default_local_path(),
        }
    }
}

/// S3 storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct S3StorageConfig {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub prefix: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
    pub virtual_hosted_style: Option<bool>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_backend() -> String {
    "local".to_string()
}

fn default_local_path() -> String {
    "./data/kvault".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    pub fn backend_kind(&self) -> Result<BackendKind> {
        self.storage
            .backend
            .parse::<BackendKind>()
            .with_context(|| format!("Invalid storage backend: {}", self.storage.backend))
    }

    /// Options handed to the storage connection
    pub fn storage_options(&self) -> StorageOptions {
        let storage = &self.storage;
        StorageOptions {
            password: storage.password.clone(),
            salt: storage.salt.clone(),
            compression_level: storage.compression_level,
            path: Some(PathBuf::from(&storage.local.path)),
            bucket: storage.s3.bucket.clone(),
            prefix: storage.s3.prefix.clone(),
            region: storage.s3.region.clone(),
            endpoint: storage.s3.endpoint.clone(),
            access_key_id: storage.s3.access_key.clone(),
            secret_access_key: storage.s3.secret_key.clone(),
            allow_http: storage.s3.allow_http,
            virtual_hosted_style: storage.s3.virtual_hosted_style,
        }
    }
}
