//! Backend selection and collection factory

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::local::FilesystemBackend;
use crate::memory::MemoryBackend;
use crate::pipeline::BlobPipeline;
use crate::s3::{ObjectStoreBackend, S3Config};
use crate::storage::Storage;

/// Kind of storage backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local table
    Memory,
    /// One directory per collection
    Filesystem,
    /// Remote S3-compatible object store
    ObjectStore,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Filesystem => "filesystem",
            BackendKind::ObjectStore => "objectstore",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "dict" => Ok(BackendKind::Memory),
            "filesystem" | "local" => Ok(BackendKind::Filesystem),
            "objectstore" | "s3" => Ok(BackendKind::ObjectStore),
            _ => Err(StorageError::Configuration(format!(
                "Unknown backend kind: {}",
                s
            ))),
        }
    }
}

/// Options shared by every backend kind, plus the kind-specific ones
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// Password for blob encryption; none or empty disables encryption
    pub password: Option<String>,
    /// Hex-encoded salt for key derivation
    pub salt: Option<String>,
    /// zlib level (0-9)
    pub compression_level: Option<u32>,
    /// Filesystem root directory (defaults to the current directory)
    pub path: Option<PathBuf>,
    /// Object store bucket (required for the object store backend)
    pub bucket: Option<String>,
    /// Object key prefix
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub allow_http: bool,
    pub virtual_hosted_style: Option<bool>,
}

impl StorageOptions {
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Build the S3 client configuration from these options
    pub fn s3_config(&self) -> Result<S3Config, StorageError> {
        let bucket = self.bucket.clone().ok_or_else(|| {
            StorageError::Configuration("Object store backend requires a bucket".to_string())
        })?;

        let defaults = S3Config::default();
        Ok(S3Config {
            bucket,
            region: self.region.clone().unwrap_or(defaults.region),
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            prefix: self.prefix.clone(),
            allow_http: self.allow_http,
            virtual_hosted_style: self.virtual_hosted_style,
        })
    }
}

/// A backend handle plus default pipeline options
///
/// Hands out [`Storage`] instances, one per collection, all sharing the same
/// backend.
#[derive(Clone)]
pub struct Connection {
    backend: Arc<dyn StorageBackend>,
    options: StorageOptions,
}

impl Connection {
    /// Build the backend for `kind` from options
    pub async fn open(kind: BackendKind, options: &StorageOptions) -> Result<Self, StorageError> {
        let backend: Arc<dyn StorageBackend> = match kind {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::Filesystem => {
                let path = options.path.clone().unwrap_or_else(|| PathBuf::from("."));
                Arc::new(FilesystemBackend::new(path).await?)
            }
            BackendKind::ObjectStore => Arc::new(ObjectStoreBackend::s3(options.s3_config()?)?),
        };

        info!("Opened {} connection", kind);
        Ok(Self::from_backend(backend, options))
    }

    /// Use an existing backend handle, such as a shared memory table
    pub fn from_backend(backend: Arc<dyn StorageBackend>, options: &StorageOptions) -> Self {
        Self {
            backend,
            options: options.clone(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Open a collection with the connection's options
    pub fn collection(&self, name: &str) -> Result<Storage, StorageError> {
        self.collection_with(name, &StorageOptions::default())
    }

    /// Open a collection, overriding password, salt or compression level
    pub fn collection_with(
        &self,
        name: &str,
        overrides: &StorageOptions,
    ) -> Result<Storage, StorageError> {
        let password = overrides.password.as_ref().or(self.options.password.as_ref());
        let salt = overrides.salt.as_ref().or(self.options.salt.as_ref());
        let level = overrides
            .compression_level
            .or(self.options.compression_level);

        let pipeline = BlobPipeline::from_options(
            password.map(String::as_str),
            salt.map(String::as_str),
            level,
        )?;
        Storage::new(name, self.backend.clone(), pipeline)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// Open one collection from a backend kind tag and options
pub async fn open_storage(
    kind: &str,
    collection: &str,
    options: &StorageOptions,
) -> Result<Storage, StorageError> {
    let kind = BackendKind::from_str(kind)?;
    Connection::open(kind, options).await?.collection(collection)
}
