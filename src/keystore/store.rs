//! Key store
//!
//! Persists [`KeyEntry`] records through an injected [`StorageBackend`] under
//! `keys/<name>` and mirrors them in an in-memory cache. The cache is owned by
//! the store instance, so independent stores never share state.

use crate::errors::{Result, SignerError};
use crate::keystore::backend::StorageBackend;
use crate::keystore::entry::KeyEntry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Default storage prefix for key records
pub const DEFAULT_KEY_PREFIX: &str = "keys/";

/// Durable key records plus a read-through cache
pub struct KeyStore {
    backend: Arc<dyn StorageBackend>,
    prefix: String,
    /// name -> entry; one lock guards the whole map
    cache: Mutex<HashMap<String, Arc<KeyEntry>>>,
    cache_enabled: bool,
}

impl KeyStore {
    /// Create a store over `backend` with the default prefix and caching on
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_options(backend, DEFAULT_KEY_PREFIX, true)
    }

    pub fn with_options(
        backend: Arc<dyn StorageBackend>,
        prefix: impl Into<String>,
        cache_enabled: bool,
    ) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            cache: Mutex::new(HashMap::new()),
            cache_enabled,
        }
    }

    /// Get an entry, consulting the cache first
    pub fn get(&self, name: &str) -> Result<Arc<KeyEntry>> {
        if let Some(entry) = self.cached(name) {
            debug!("Key cache hit: {}", name);
            return Ok(entry);
        }

        debug!("Key cache miss: {}", name);
        let data = self
            .backend
            .get(&self.storage_key(name))?
            .ok_or_else(|| SignerError::KeyNotFound(name.to_string()))?;

        let entry = Arc::new(KeyEntry::from_json(&data)?);
        if self.cache_enabled {
            self.cache().insert(name.to_string(), entry.clone());
        }
        Ok(entry)
    }

    /// Check whether a key exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        if self.cached(name).is_some() {
            return Ok(true);
        }
        Ok(self.backend.get(&self.storage_key(name))?.is_some())
    }

    /// Persist a new entry.
    ///
    /// Fails with `KeyExists` if the name is taken. Either the entry is both
    /// persisted and cached, or neither.
    pub fn create(&self, name: &str, entry: KeyEntry) -> Result<Arc<KeyEntry>> {
        let data = Zeroizing::new(entry.to_json()?);

        if !self.backend.put_if_absent(&self.storage_key(name), &data)? {
            return Err(SignerError::KeyExists(name.to_string()));
        }

        let entry = Arc::new(entry);
        if self.cache_enabled {
            self.cache().insert(name.to_string(), entry.clone());
        }

        info!("Stored key: {}", name);
        Ok(entry)
    }

    /// Delete a key from both cache and storage. Absent keys are fine.
    pub fn delete(&self, name: &str) -> Result<()> {
        // Remove from cache first so a failed backend delete cannot leave a
        // stale cached copy behind
        self.cache().remove(name);
        self.backend.delete(&self.storage_key(name))?;

        info!("Deleted key: {}", name);
        Ok(())
    }

    /// List stored key names in backend order
    pub fn list(&self) -> Result<Vec<String>> {
        self.backend.list(&self.prefix)
    }

    /// Drop every cached entry
    pub fn clear_cache(&self) {
        self.cache().clear();
        debug!("Key cache cleared");
    }

    /// Number of cached entries
    pub fn cached_len(&self) -> usize {
        self.cache().len()
    }

    fn storage_key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn cached(&self, name: &str) -> Option<Arc<KeyEntry>> {
        if !self.cache_enabled {
            return None;
        }
        self.cache().get(name).cloned()
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, Arc<KeyEntry>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
