//! Synchronous facade over [`Storage`]
//!
//! Each call drives the async operation to completion on a private
//! current-thread runtime. Do not use it from inside an async runtime:
//! blocking on a runtime from within another one panics.

use bytes::Bytes;
use futures::TryStreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::runtime::{Builder, Runtime};

use crate::connection::StorageOptions;
use crate::error::StorageError;
use crate::storage::Storage;

/// Blocking key-value view over one collection
pub struct BlockingStorage {
    inner: Storage,
    runtime: Runtime,
}

impl BlockingStorage {
    /// Wrap an already opened collection
    pub fn new(inner: Storage) -> Result<Self, StorageError> {
        Ok(Self {
            inner,
            runtime: runtime()?,
        })
    }

    /// Open one collection from a backend kind tag and options
    pub fn open(
        kind: &str,
        collection: &str,
        options: &StorageOptions,
    ) -> Result<Self, StorageError> {
        let runtime = runtime()?;
        let inner = runtime.block_on(crate::connection::open_storage(kind, collection, options))?;
        Ok(Self { inner, runtime })
    }

    /// The wrapped async storage
    pub fn inner(&self) -> &Storage {
        &self.inner
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        self.runtime.block_on(self.inner.get(key))
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, StorageError> {
        self.runtime.block_on(self.inner.get_or(key, default))
    }

    pub fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<Bytes, StorageError> {
        self.runtime.block_on(self.inner.put(key, value))
    }

    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.runtime.block_on(self.inner.delete(key))
    }

    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        self.runtime.block_on(self.inner.list())
    }

    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.list()
    }

    pub fn contains(&self, key: &str) -> Result<bool, StorageError> {
        self.runtime.block_on(self.inner.contains(key))
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        self.runtime.block_on(self.inner.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        self.runtime.block_on(self.inner.is_empty())
    }

    /// Read every entry, newest first
    pub fn items<T: DeserializeOwned>(&self) -> Result<Vec<(String, T)>, StorageError> {
        self.runtime.block_on(async {
            let items = self.inner.items::<T>().await?;
            let collected: Vec<(String, T)> = items.try_collect().await?;
            Ok::<_, StorageError>(collected)
        })
    }

    pub fn update<K, V, I>(&self, entries: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Serialize,
    {
        self.runtime.block_on(self.inner.update(entries))
    }

    pub fn pop<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        self.runtime.block_on(self.inner.pop(key))
    }

    pub fn pop_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, StorageError> {
        self.runtime.block_on(self.inner.pop_or(key, default))
    }
}

fn runtime() -> Result<Runtime, StorageError> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}
