//! Password-based encryption stage
//!
//! Keys are derived with HKDF-SHA256 from the password and salt, and blobs
//! are sealed with AES-256-GCM under a fresh random nonce:
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! Without a password the stage is the identity.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::StorageError;

/// Size of the derived AES-256 key in bytes
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// HKDF info label, keeps these keys apart from any other use of the password
const KEY_INFO: &[u8] = b"kvault/password-key/v1";

/// Encryption key derived from a password
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Derive a key from a password and salt
    pub fn derive(password: &[u8], salt: &[u8]) -> Result<Self, StorageError> {
        let hk = Hkdf::<Sha256>::new(Some(salt), password);

        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(KEY_INFO, &mut bytes)
            .map_err(|_| StorageError::Crypto("key derivation failed".to_string()))?;

        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Optional symmetric cipher bound to one derived key
#[derive(Clone, Default)]
pub struct Cipher {
    aead: Option<Aes256Gcm>,
}

impl Cipher {
    /// A cipher that leaves data untouched
    pub fn none() -> Self {
        Self { aead: None }
    }

    /// Build a cipher from an already derived key
    pub fn with_key(key: &EncryptionKey) -> Self {
        let aead = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        Self { aead: Some(aead) }
    }

    /// Build a cipher from a password; an empty password disables encryption
    pub fn from_password(password: &str, salt: &[u8]) -> Result<Self, StorageError> {
        if password.is_empty() {
            return Ok(Self::none());
        }
        let key = EncryptionKey::derive(password.as_bytes(), salt)?;
        Ok(Self::with_key(&key))
    }

    pub fn is_enabled(&self) -> bool {
        self.aead.is_some()
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, StorageError> {
        let Some(aead) = &self.aead else {
            return Ok(plaintext.to_vec());
        };

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = aead
            .encrypt(nonce, plaintext)
            .map_err(|_| StorageError::Crypto("encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend(ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        let Some(aead) = &self.aead else {
            return Ok(data.to_vec());
        };

        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(StorageError::Crypto("ciphertext too short".to_string()));
        }

        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
        aead.decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StorageError::Crypto("wrong password or corrupt ciphertext".to_string()))
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("algorithm", &if self.is_enabled() { "aes-256-gcm" } else { "none" })
            .finish()
    }
}
