//! Collection-scoped key-value storage
//!
//! [`Storage`] binds one collection to a backend and a blob pipeline. Every
//! key is name-encoded before it reaches the backend and every value goes
//! through the pipeline, so backends only ever see tokens and opaque blobs.

use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::name;
use crate::pipeline::BlobPipeline;

/// Encrypted, compressed key-value view over one collection
#[derive(Clone)]
pub struct Storage {
    collection: String,
    token: String,
    backend: Arc<dyn StorageBackend>,
    pipeline: Arc<BlobPipeline>,
}

impl Storage {
    /// Bind a collection to a backend
    pub fn new(
        collection: &str,
        backend: Arc<dyn StorageBackend>,
        pipeline: BlobPipeline,
    ) -> Result<Self, StorageError> {
        name::validate(collection)?;

        debug!(
            "Opening collection {:?} on {} backend (encrypted: {})",
            collection,
            backend.name(),
            pipeline.is_encrypted()
        );

        Ok(Self {
            collection: collection.to_string(),
            token: name::encode(collection),
            backend,
            pipeline: Arc::new(pipeline),
        })
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.collection
    }

    /// Collection token as seen by the backend
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    fn key_token(key: &str) -> Result<String, StorageError> {
        name::validate(key)?;
        Ok(name::encode(key))
    }

    /// Get one value from the collection
    ///
    /// A missing key yields `Ok(None)`. Every other failure, including a
    /// wrong password or a corrupt blob, is returned as an error rather than
    /// being reported as a missing key.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let token = Self::key_token(key)?;

        let blob = match self.backend.get(&self.token, &token).await {
            Ok(blob) => blob,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        self.pipeline.open(&blob).map(Some)
    }

    /// Get one value, falling back to `default` when the key is missing
    pub async fn get_or<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, StorageError> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Put a value into the collection, returning the stored blob
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<Bytes, StorageError> {
        let token = Self::key_token(key)?;
        let blob = self.pipeline.seal(value)?;

        debug!(
            "Storing {} bytes at {}/{}",
            blob.len(),
            self.collection,
            key
        );

        self.backend.put(&self.token, &token, blob.clone()).await?;
        Ok(blob)
    }

    /// Delete a value from the collection
    ///
    /// Deleting a missing key is an error on the memory and filesystem
    /// backends and a no-op on object stores.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let token = Self::key_token(key)?;
        self.backend.delete(&self.token, &token).await
    }

    /// List keys, newest first
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        self.backend
            .list(&self.token)
            .await?
            .iter()
            .map(|token| name::decode(token))
            .collect()
    }

    /// Alias for [`Storage::list`]
    pub async fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.list().await
    }

    pub async fn contains(&self, key: &str) -> Result<bool, StorageError> {
        let token = Self::key_token(key)?;
        self.backend.exists(&self.token, &token).await
    }

    pub async fn len(&self) -> Result<usize, StorageError> {
        Ok(self.list().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len().await? == 0)
    }

    /// Lazily read every entry, newest first
    ///
    /// Keys are listed up front; values are fetched as the stream is polled.
    /// Keys removed after the listing are skipped. Call again to restart.
    pub async fn items<T: DeserializeOwned>(
        &self,
    ) -> Result<impl Stream<Item = Result<(String, T), StorageError>> + '_, StorageError> {
        let keys = self.list().await?;

        Ok(stream::iter(keys).filter_map(move |key| async move {
            let value = self.get::<T>(&key).await;
            match value {
                Ok(Some(value)) => Some(Ok((key, value))),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        }))
    }

    /// Put every entry, in iteration order
    ///
    /// Not atomic: stops at the first failure and keeps the entries already
    /// written.
    pub async fn update<K, V, I>(&self, entries: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Serialize,
    {
        for (key, value) in entries {
            self.put(key.as_ref(), &value).await?;
        }
        Ok(())
    }

    /// Get a value and remove it
    ///
    /// The read, the existence check and the delete are separate backend
    /// calls. A concurrent delete between them surfaces as the backend's
    /// delete error.
    pub async fn pop<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let value = self.get(key).await?;
        if self.contains(key).await? {
            self.delete(key).await?;
        }
        Ok(value)
    }

    /// Pop a value, falling back to `default` when the key is missing
    pub async fn pop_or<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, StorageError> {
        Ok(self.pop(key).await?.unwrap_or(default))
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("collection", &self.collection)
            .field("token", &self.token)
            .field("backend", &self.backend.name())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
