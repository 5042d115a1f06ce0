//! In-memory storage backend

use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::backend::StorageBackend;
use crate::error::StorageError;

type Collections = HashMap<String, IndexMap<String, Bytes>>;

/// Shared in-memory table
///
/// Maps a collection token to its keys in insertion order. Cloning the
/// handle shares the table, so every backend built from clones of one table
/// sees the same data. Access is serialized by an internal lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection tokens currently present
    pub fn collections(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    /// Raw stored blob, addressed by tokens
    pub fn blob(&self, collection: &str, key: &str) -> Option<Bytes> {
        self.inner.read().get(collection)?.get(key).cloned()
    }
}

/// In-memory storage backend
///
/// Keys keep their insertion order; re-putting a key moves it to the newest
/// position.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    table: MemoryTable,
}

impl MemoryBackend {
    /// Create a backend over a fresh, private table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend over a shared table
    pub fn with_table(table: MemoryTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &MemoryTable {
        &self.table
    }
}

fn not_found(collection: &str, key: &str) -> StorageError {
    StorageError::NotFound(format!("{}/{}", collection, key))
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(&self, collection: &str, key: &str, data: Bytes) -> Result<(), StorageError> {
        debug!("Writing {} bytes to memory: {}/{}", data.len(), collection, key);

        let mut map = self.table.inner.write();
        let entries = map.entry(collection.to_string()).or_default();
        // Removing first moves an overwritten key to the newest position
        entries.shift_remove(key);
        entries.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Bytes, StorageError> {
        self.table
            .blob(collection, key)
            .ok_or_else(|| not_found(collection, key))
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StorageError> {
        debug!("Deleting from memory: {}/{}", collection, key);

        let mut map = self.table.inner.write();
        map.get_mut(collection)
            .and_then(|entries| entries.shift_remove(key))
            .map(|_| ())
            .ok_or_else(|| not_found(collection, key))
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StorageError> {
        let map = self.table.inner.read();
        Ok(map
            .get(collection)
            .map(|entries| entries.keys().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn exists(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        let map = self.table.inner.read();
        Ok(map
            .get(collection)
            .is_some_and(|entries| entries.contains_key(key)))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_crud() {
        let backend = MemoryBackend::new();

        assert!(!backend.exists("c", "k1").await.unwrap());
        assert!(backend.list("c").await.unwrap().is_empty());

        backend.put("c", "k1", Bytes::from_static(b"v1")).await.unwrap();
        assert!(backend.exists("c", "k1").await.unwrap());
        assert_eq!(backend.get("c", "k1").await.unwrap(), Bytes::from_static(b"v1"));

        backend.delete("c", "k1").await.unwrap();
        assert!(!backend.exists("c", "k1").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_keys_are_not_found() {
        let backend = MemoryBackend::new();
        backend.put("c", "k1", Bytes::new()).await.unwrap();

        assert!(backend.get("c", "absent").await.unwrap_err().is_not_found());
        assert!(backend.get("other", "k1").await.unwrap_err().is_not_found());
        assert!(backend.delete("c", "absent").await.unwrap_err().is_not_found());
        assert!(backend.delete("other", "k1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_newest_first_with_overwrite() {
        let backend = MemoryBackend::new();
        backend.put("c", "k1", Bytes::from_static(b"a")).await.unwrap();
        backend.put("c", "k2", Bytes::from_static(b"b")).await.unwrap();
        backend.put("c", "k3", Bytes::from_static(b"c")).await.unwrap();
        assert_eq!(backend.list("c").await.unwrap(), vec!["k3", "k2", "k1"]);

        backend.put("c", "k1", Bytes::from_static(b"a2")).await.unwrap();
        assert_eq!(backend.list("c").await.unwrap(), vec!["k1", "k3", "k2"]);
        assert_eq!(backend.get("c", "k1").await.unwrap(), Bytes::from_static(b"a2"));
    }

    #[tokio::test]
    async fn test_shared_table_visibility() {
        let table = MemoryTable::new();
        let writer = MemoryBackend::with_table(table.clone());
        let reader = MemoryBackend::with_table(table.clone());

        writer.put("c", "k", Bytes::from_static(b"v")).await.unwrap();

        assert_eq!(reader.get("c", "k").await.unwrap(), Bytes::from_static(b"v"));
        assert_eq!(table.collections(), vec!["c"]);
        assert_eq!(table.blob("c", "k"), Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let backend = MemoryBackend::new();
        backend.put("a", "k", Bytes::from_static(b"1")).await.unwrap();
        backend.put("b", "k", Bytes::from_static(b"2")).await.unwrap();

        backend.delete("a", "k").await.unwrap();
        assert!(!backend.exists("a", "k").await.unwrap());
        assert!(backend.exists("b", "k").await.unwrap());
    }
}
