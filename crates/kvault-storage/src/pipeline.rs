//! Blob encoding pipeline
//!
//! Write: value -> CBOR -> zlib -> AES-GCM -> header.
//! Read is the exact inverse. Every stored blob starts with a two byte
//! header: format version, then flags.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cipher::Cipher;
use crate::codec;
use crate::compress::Compressor;
use crate::error::StorageError;

/// Current blob format version
pub const FORMAT_VERSION: u8 = 1;

/// Header flag: payload is encrypted
pub const FLAG_ENCRYPTED: u8 = 0b0000_0001;

const HEADER_LEN: usize = 2;

/// The serialize/compress/encrypt stages owned by one storage instance
#[derive(Debug, Clone, Default)]
pub struct BlobPipeline {
    compressor: Compressor,
    cipher: Cipher,
}

impl BlobPipeline {
    pub fn new(compressor: Compressor, cipher: Cipher) -> Self {
        Self { compressor, cipher }
    }

    /// Build a pipeline from raw options
    ///
    /// `salt` is a hex string and is decoded before key derivation.
    pub fn from_options(
        password: Option<&str>,
        salt: Option<&str>,
        compression_level: Option<u32>,
    ) -> Result<Self, StorageError> {
        let salt = match salt {
            Some(s) => hex::decode(s).map_err(|e| {
                StorageError::Configuration(format!("salt must be a hex string: {}", e))
            })?,
            None => Vec::new(),
        };

        let cipher = Cipher::from_password(password.unwrap_or_default(), &salt)?;
        let compressor = match compression_level {
            Some(level) => Compressor::new(level)?,
            None => Compressor::default(),
        };

        Ok(Self::new(compressor, cipher))
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_enabled()
    }

    /// Turn a value into the blob that will be stored
    pub fn seal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes, StorageError> {
        let raw = codec::serialize(value)?;
        let compressed = self.compressor.compress(&raw)?;
        let payload = self.cipher.encrypt(&compressed)?;

        let flags = if self.cipher.is_enabled() { FLAG_ENCRYPTED } else { 0 };

        let mut blob = Vec::with_capacity(HEADER_LEN + payload.len());
        blob.push(FORMAT_VERSION);
        blob.push(flags);
        blob.extend(payload);
        Ok(Bytes::from(blob))
    }

    /// Recover a value from a stored blob
    pub fn open<T: DeserializeOwned>(&self, blob: &[u8]) -> Result<T, StorageError> {
        if blob.len() < HEADER_LEN {
            return Err(StorageError::CorruptData("blob header truncated".to_string()));
        }

        let (header, payload) = blob.split_at(HEADER_LEN);
        if header[0] != FORMAT_VERSION {
            return Err(StorageError::CorruptData(format!(
                "unsupported blob format version {}",
                header[0]
            )));
        }

        let encrypted = header[1] & FLAG_ENCRYPTED != 0;
        match (encrypted, self.cipher.is_enabled()) {
            (true, false) => {
                return Err(StorageError::Crypto(
                    "blob is encrypted but no password is configured".to_string(),
                ));
            }
            (false, true) => {
                return Err(StorageError::Crypto(
                    "blob is not encrypted but a password is configured".to_string(),
                ));
            }
            _ => {}
        }

        let compressed = self.cipher.decrypt(payload)?;
        let raw = self.compressor.decompress(&compressed)?;
        codec::deserialize(&raw)
    }
}
