//! zlib compression stage

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

use crate::error::StorageError;

/// Default zlib level, matching zlib's own default
pub const DEFAULT_LEVEL: u32 = 6;

/// Highest level accepted by zlib
pub const MAX_LEVEL: u32 = 9;

/// Lossless byte compressor
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    level: Compression,
}

impl Compressor {
    /// Create a compressor with the given zlib level (0-9)
    pub fn new(level: u32) -> Result<Self, StorageError> {
        if level > MAX_LEVEL {
            return Err(StorageError::Configuration(format!(
                "compression level {} is out of range 0-{}",
                level, MAX_LEVEL
            )));
        }
        Ok(Self {
            level: Compression::new(level),
        })
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
        encoder
            .write_all(data)
            .map_err(|e| StorageError::Serialization(format!("compression failed: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| StorageError::Serialization(format!("compression failed: {}", e)))
    }

    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| StorageError::CorruptData(format!("decompression failed: {}", e)))?;
        Ok(out)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self {
            level: Compression::new(DEFAULT_LEVEL),
        }
    }
}
