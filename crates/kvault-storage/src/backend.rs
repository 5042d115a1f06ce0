//! Storage backend trait

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

/// Storage backend trait
///
/// A backend persists opaque blobs addressed by a collection token and a key
/// token. Tokens are already name-encoded by the caller, so backends never
/// see raw user-supplied names.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write a blob, replacing any existing one and making it the newest
    async fn put(&self, collection: &str, key: &str, data: Bytes) -> Result<(), StorageError>;

    /// Read a blob fully into memory; `NotFound` if absent
    async fn get(&self, collection: &str, key: &str) -> Result<Bytes, StorageError>;

    /// Delete a blob
    ///
    /// Whether deleting an absent blob is an error is backend-defined.
    async fn delete(&self, collection: &str, key: &str) -> Result<(), StorageError>;

    /// List key tokens of a collection, newest first
    async fn list(&self, collection: &str) -> Result<Vec<String>, StorageError>;

    /// Check if a blob exists
    async fn exists(&self, collection: &str, key: &str) -> Result<bool, StorageError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}
