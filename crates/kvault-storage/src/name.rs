//! Backend-safe name tokens
//!
//! Collection and key names are never handed to a backend as-is. They are
//! mapped to the lowercase hex of their UTF-8 bytes, which is valid as a
//! file name, an object-store path segment and a map key alike.

use crate::error::StorageError;

/// Encode a collection or key name into its token
pub fn encode(name: &str) -> String {
    hex::encode(name.as_bytes())
}

/// Decode a token back into the original name
pub fn decode(token: &str) -> Result<String, StorageError> {
    let bytes = hex::decode(token)
        .map_err(|e| StorageError::Decode(format!("{}: {}", token, e)))?;

    String::from_utf8(bytes)
        .map_err(|e| StorageError::Decode(format!("{}: {}", token, e)))
}

/// Check that a name can be turned into a non-empty token
pub(crate) fn validate(name: &str) -> Result<(), StorageError> {
    if name.is_empty() {
        return Err(StorageError::InvalidName(
            "names must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Whether a string looks like a token produced by [`encode`]
pub(crate) fn is_token(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() % 2 == 0
        && candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
