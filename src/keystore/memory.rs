//! In-memory storage backend
//!
//! Holds serialized entries in a single ordered map. Used for standalone
//! operation and as the test double for the durable collaborator.

use crate::errors::Result;
use crate::keystore::backend::{validate_storage_key, StorageBackend};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use zeroize::Zeroize;

/// In-memory key/value backend
#[derive(Default)]
pub struct MemoryBackend {
    values: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Create a new empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_storage_key(key)?;
        Ok(self.values().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        validate_storage_key(key)?;
        if let Some(mut old) = self.values().insert(key.to_string(), value.to_vec()) {
            old.zeroize();
        }
        debug!("Stored value: {}", key);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        validate_storage_key(key)?;
        if let Some(mut old) = self.values().remove(key) {
            old.zeroize();
            debug!("Deleted value: {}", key);
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let values = self.values();
        let names = values
            .range(prefix.to_string()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .map(|key| &key[prefix.len()..])
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect();
        Ok(names)
    }

    fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool> {
        validate_storage_key(key)?;
        let mut values = self.values();
        if values.contains_key(key) {
            return Ok(false);
        }
        values.insert(key.to_string(), value.to_vec());
        debug!("Stored value: {}", key);
        Ok(true)
    }
}

impl Drop for MemoryBackend {
    fn drop(&mut self) {
        for value in self.values().values_mut() {
            value.zeroize();
        }
    }
}
