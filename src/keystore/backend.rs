//! Durable storage collaborator
//!
//! The key store only needs a flat key/value contract. Hosts inject their
//! own implementation; [`MemoryBackend`](super::MemoryBackend) and
//! [`EncryptedFileBackend`](super::EncryptedFileBackend) ship with the crate.

use crate::errors::{Result, SignerError};

/// Key/value storage consumed by [`KeyStore`](super::KeyStore).
///
/// Calls are synchronous and are not retried by the caller. Implementations
/// must be `Send + Sync`; the key store shares one backend across threads.
pub trait StorageBackend: Send + Sync {
    /// Fetch a value, `None` if absent
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any existing one
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a value. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// List the names directly under `prefix`, with the prefix stripped.
    ///
    /// Order is backend-defined. An empty prefix yields an empty vector.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Write only if `key` is absent. Returns `false` if it already existed.
    ///
    /// The default is a plain get-then-put and is NOT atomic; two callers can
    /// both observe absence and both write. Backends that can do better
    /// should override it.
    fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool> {
        if self.get(key)?.is_some() {
            return Ok(false);
        }
        self.put(key, value)?;
        Ok(true)
    }
}

/// Reject keys that could escape a hierarchical namespace
pub(crate) fn validate_storage_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(SignerError::InvalidInput("empty storage key".to_string()));
    }
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(SignerError::InvalidInput(format!(
                "invalid storage key: {}",
                key
            )));
        }
    }
    Ok(())
}
