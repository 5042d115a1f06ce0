//! Local disk storage backend

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::name;

/// Smallest step between two modification stamps
const STAMP_STEP: Duration = Duration::from_micros(1);

/// Local disk storage backend
///
/// Stores one file per key:
/// `<base_path>/<collection token>/<key token>`
///
/// Listing is ordered by modification time, newest first. Each write stamps
/// its file from a monotonic clock so that writes made within one filesystem
/// clock tick still order correctly.
pub struct FilesystemBackend {
    base_path: PathBuf,
    last_stamp: Mutex<SystemTime>,
}

impl FilesystemBackend {
    /// Create a new local storage backend
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();

        fs::create_dir_all(&base_path).await?;

        info!("Initialized local storage at {:?}", base_path);

        Ok(Self {
            base_path,
            last_stamp: Mutex::new(SystemTime::UNIX_EPOCH),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(collection)
    }

    fn blob_path(&self, collection: &str, key: &str) -> PathBuf {
        self.collection_path(collection).join(key)
    }

    /// Next modification stamp, strictly after the previous one
    fn next_stamp(&self) -> SystemTime {
        let mut last = self.last_stamp.lock();
        let now = SystemTime::now();
        let stamp = if now > *last { now } else { *last + STAMP_STEP };
        *last = stamp;
        stamp
    }

    /// Fill the temp file, stamp it and move it over the final path
    async fn finish_write(
        &self,
        mut file: fs::File,
        data: &[u8],
        temp_path: &Path,
        path: &Path,
    ) -> std::io::Result<()> {
        file.write_all(data).await?;
        file.flush().await?;

        let file = file.into_std().await;
        file.set_modified(self.next_stamp())?;
        drop(file);

        fs::rename(temp_path, path).await
    }
}

fn map_not_found(e: std::io::Error, path: &Path) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(path.to_string_lossy().to_string())
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn put(&self, collection: &str, key: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.blob_path(collection, key);
        debug!("Writing blob to {:?}", path);

        fs::create_dir_all(self.collection_path(collection)).await?;

        // Write atomically using a dot-prefixed temp file, which listing skips.
        // The temp name does not embed the key token so it never outgrows it.
        let temp_path = self
            .collection_path(collection)
            .join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        if let Err(e) = self.finish_write(file, &data, &temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Bytes, StorageError> {
        let path = self.blob_path(collection, key);
        debug!("Reading blob from {:?}", path);

        let data = fs::read(&path).await.map_err(|e| map_not_found(e, &path))?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<(), StorageError> {
        let path = self.blob_path(collection, key);
        debug!("Deleting blob at {:?}", path);

        fs::remove_file(&path)
            .await
            .map_err(|e| map_not_found(e, &path))
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.collection_path(collection);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(token) = entry.file_name().into_string() else {
                continue;
            };
            if !name::is_token(&token) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(m) => m,
                // Deleted between read_dir and stat
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e)),
            };
            if !metadata.is_file() {
                continue;
            }
            found.push((metadata.modified()?, token));
        }

        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(found.into_iter().map(|(_, token)| token).collect())
    }

    async fn exists(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        let path = self.blob_path(collection, key);
        Ok(fs::try_exists(&path).await?)
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}
