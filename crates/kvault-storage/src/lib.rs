//! kvault Storage Layer
//!
//! This crate provides an encrypted, compressed key-value view over
//! in-memory, local disk and S3-compatible backends.

pub mod backend;
pub mod blocking;
pub mod cipher;
pub mod codec;
pub mod compress;
pub mod connection;
pub mod error;
pub mod local;
pub mod memory;
pub mod name;
pub mod pipeline;
pub mod s3;
pub mod storage;

pub use backend::StorageBackend;
pub use blocking::BlockingStorage;
pub use codec::Value;
pub use connection::{BackendKind, Connection, StorageOptions, open_storage};
pub use error::StorageError;
pub use local::FilesystemBackend;
pub use memory::{MemoryBackend, MemoryTable};
pub use pipeline::BlobPipeline;
pub use s3::{ObjectStoreBackend, S3Config};
pub use storage::Storage;
