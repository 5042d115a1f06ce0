//! Object store backend
//!
//! Uses the `object_store` crate, so any of its stores can back a
//! collection. `ObjectStoreBackend::s3` builds a client for AWS S3, MinIO
//! and other S3-compatible services.

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::name;

/// S3 storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// S3 region (e.g., "us-east-1")
    pub region: String,
    /// S3 endpoint URL (for MinIO or other S3-compatible services)
    pub endpoint: Option<String>,
    /// AWS access key ID
    pub access_key_id: Option<String>,
    /// AWS secret access key
    pub secret_access_key: Option<String>,
    /// Prefix for all objects (optional)
    pub prefix: Option<String>,
    /// Allow HTTP (not HTTPS) connections
    pub allow_http: bool,
    /// Use virtual-hosted-style requests instead of path-style
    pub virtual_hosted_style: Option<bool>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "kvault".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            prefix: None,
            allow_http: false,
            virtual_hosted_style: None,
        }
    }
}

/// Object store backend
///
/// Stores blobs under `<prefix>/<collection token>/<key token>`.
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    prefix: Option<ObjectPath>,
}

impl ObjectStoreBackend {
    /// Wrap an existing object store client
    pub fn new(store: Arc<dyn ObjectStore>, prefix: Option<&str>) -> Result<Self, StorageError> {
        let prefix = match prefix.map(str::trim).filter(|p| !p.trim_matches('/').is_empty()) {
            Some(p) => Some(ObjectPath::parse(p.trim_matches('/')).map_err(|e| {
                StorageError::Configuration(format!("Invalid object prefix {:?}: {}", p, e))
            })?),
            None => None,
        };

        Ok(Self { store, prefix })
    }

    /// Create a backend talking to an S3-compatible service
    pub fn s3(config: S3Config) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region);

        // Set endpoint for MinIO or other S3-compatible services
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        // Set credentials
        if let Some(access_key) = &config.access_key_id {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret_key);
        }

        // Allow HTTP for local development (MinIO)
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        if let Some(virtual_hosted) = config.virtual_hosted_style {
            builder = builder.with_virtual_hosted_style_request(virtual_hosted);
        }

        let store = builder.build().map_err(|e| {
            StorageError::Configuration(format!("Failed to create S3 client: {}", e))
        })?;

        info!(
            "Initialized S3 storage: bucket={}, region={}, endpoint={:?}, prefix={:?}",
            config.bucket, config.region, config.endpoint, config.prefix
        );

        Self::new(Arc::new(store), config.prefix.as_deref())
    }

    /// Get the object path for a collection
    fn collection_path(&self, collection: &str) -> ObjectPath {
        match &self.prefix {
            Some(prefix) => prefix.child(collection),
            None => ObjectPath::from_iter([collection]),
        }
    }

    /// Get the object path for a key
    fn blob_path(&self, collection: &str, key: &str) -> ObjectPath {
        self.collection_path(collection).child(key)
    }
}

fn map_not_found(e: object_store::Error, path: &ObjectPath) -> StorageError {
    match e {
        object_store::Error::NotFound { .. } => StorageError::NotFound(path.to_string()),
        other => StorageError::ObjectStore(other),
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn put(&self, collection: &str, key: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.blob_path(collection, key);
        debug!("Writing blob to object store: {:?}", path);

        self.store.put(&path, PutPayload::from(data)).await?;
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Bytes, StorageError> {
        let path = self.blob_path(collection, key);
        debug!("Reading blob from object store: {:?}", path);

        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| map_not_found(e, &path))?;

        Ok(result.bytes().await?)
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StorageError> {
        let path = self.blob_path(collection, key);
        debug!("Deleting blob from object store: {:?}", path);

        match self.store.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::ObjectStore(e)),
        }
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StorageError> {
        let prefix = self.collection_path(collection);
        debug!("Listing object store prefix: {:?}", prefix);

        let mut objects: Vec<ObjectMeta> = self.store.list(Some(&prefix)).try_collect().await?;

        // Only direct children named by a token belong to the collection
        let depth = prefix.parts().count() + 1;
        objects.retain(|meta| {
            meta.location.parts().count() == depth
                && meta.location.filename().is_some_and(name::is_token)
        });

        objects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(objects
            .into_iter()
            .filter_map(|meta| meta.location.filename().map(str::to_string))
            .collect())
    }

    async fn exists(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        let path = self.blob_path(collection, key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::ObjectStore(e)),
        }
    }

    fn name(&self) -> &'static str {
        "objectstore"
    }
}
