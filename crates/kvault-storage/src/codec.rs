//! Structured value serialization
//!
//! Values are encoded as CBOR, a self-describing tagged binary format that
//! covers scalars, byte strings, sequences and maps of any nesting.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;

/// Dynamically typed value, for callers without a static schema
pub type Value = ciborium::Value;

/// Serialize a value to bytes
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StorageError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a value produced by [`serialize`]
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::CorruptData(e.to_string()))
}
