//! Key lifecycle management
//!
//! Creates, imports, reads, lists, exports and deletes keys on top of a
//! [`KeyStore`]. Only [`KeyManager::export`] ever hands out private key bytes.

use crate::crypto::address::{cosmos_address_hex, ethereum_address_from_public_key};
use crate::crypto::keypair::{Secp256k1KeyPair, PRIVATE_KEY_LEN};
use crate::errors::{Result, SignerError};
use crate::keystore::entry::KeyEntry;
use crate::keystore::store::KeyStore;
use crate::security::SecureBytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Public view of a stored key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMetadata {
    pub name: String,
    /// Compressed public key, lowercase hex
    pub public_key_hex: String,
    /// RIPEMD160(SHA256(compressed)), lowercase hex
    pub cosmos_address_hex: String,
    /// EIP-55 checksummed, `0x` prefixed
    pub eth_address: String,
    pub exportable: bool,
    /// RFC 3339, UTC
    pub created_at: String,
    pub imported: bool,
}

impl KeyMetadata {
    fn from_entry(name: &str, entry: &KeyEntry) -> Result<Self> {
        let eth_source = entry
            .public_key_uncompressed
            .as_deref()
            .unwrap_or(entry.public_key.as_slice());

        Ok(Self {
            name: name.to_string(),
            public_key_hex: hex::encode(&entry.public_key),
            cosmos_address_hex: cosmos_address_hex(&entry.public_key)?,
            eth_address: ethereum_address_from_public_key(eth_source)?,
            exportable: entry.exportable,
            created_at: entry.created_at_rfc3339(),
            imported: entry.imported,
        })
    }
}

/// An exported key: metadata plus the raw private scalar
pub struct ExportedKey {
    pub metadata: KeyMetadata,
    pub private_key: SecureBytes,
}

/// Key lifecycle operations over a shared [`KeyStore`]
pub struct KeyManager {
    store: Arc<KeyStore>,
}

impl KeyManager {
    pub fn new(store: Arc<KeyStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<KeyStore> {
        &self.store
    }

    /// Generate and persist a fresh key
    pub fn create(&self, name: &str, exportable: bool) -> Result<KeyMetadata> {
        validate_key_name(name)?;

        let keypair = Secp256k1KeyPair::generate();
        let entry = self
            .store
            .create(name, KeyEntry::from_keypair(&keypair, exportable, false))?;

        info!("Created key: {} (exportable: {})", name, exportable);
        KeyMetadata::from_entry(name, &entry)
    }

    /// Import a raw 32-byte private key given as standard base64.
    ///
    /// The payload is not wrapped or encrypted in transit.
    pub fn import(&self, name: &str, encoded: &str, exportable: bool) -> Result<KeyMetadata> {
        validate_key_name(name)?;

        if encoded.is_empty() {
            return Err(SignerError::InvalidInput("missing key material".to_string()));
        }

        let private_key = SecureBytes::from_base64(encoded)?;
        if private_key.len() != PRIVATE_KEY_LEN {
            warn!("Rejected import of {}: wrong key length", name);
            return Err(SignerError::InvalidKey(format!(
                "expected {} bytes, got {}",
                PRIVATE_KEY_LEN,
                private_key.len()
            )));
        }

        let keypair = Secp256k1KeyPair::from_bytes(private_key.expose())?;
        let entry = self
            .store
            .create(name, KeyEntry::from_keypair(&keypair, exportable, true))?;

        info!("Imported key: {} (exportable: {})", name, exportable);
        KeyMetadata::from_entry(name, &entry)
    }

    /// Public metadata for one key
    pub fn read(&self, name: &str) -> Result<KeyMetadata> {
        validate_key_name(name)?;
        let entry = self.store.get(name)?;
        KeyMetadata::from_entry(name, &entry)
    }

    /// Public metadata for every key, in storage order.
    ///
    /// Names that disappear between listing and reading are skipped, as are
    /// entries that fail to load. Only a failure to enumerate is an error.
    pub fn list(&self) -> Result<Vec<KeyMetadata>> {
        let names = self.store.list()?;
        let mut keys = Vec::with_capacity(names.len());

        for name in names {
            let loaded = self
                .store
                .get(&name)
                .and_then(|entry| KeyMetadata::from_entry(&name, &entry));
            match loaded {
                Ok(meta) => keys.push(meta),
                Err(SignerError::KeyNotFound(_)) => {
                    debug!("Key vanished during listing: {}", name);
                }
                Err(e) => {
                    warn!("Skipping unreadable key {}: {}", name, e);
                }
            }
        }

        Ok(keys)
    }

    /// Hand out the raw private key of an exportable key
    pub fn export(&self, name: &str) -> Result<ExportedKey> {
        validate_key_name(name)?;
        let entry = self.store.get(name)?;

        if !entry.exportable {
            warn!("Rejected export of non-exportable key: {}", name);
            return Err(SignerError::KeyNotExportable(name.to_string()));
        }

        info!("Exported key: {}", name);
        Ok(ExportedKey {
            metadata: KeyMetadata::from_entry(name, &entry)?,
            private_key: SecureBytes::from(entry.private_key.as_slice()),
        })
    }

    /// Delete a key. Deleting an absent key succeeds.
    pub fn delete(&self, name: &str) -> Result<()> {
        validate_key_name(name)?;
        self.store.delete(name)
    }

    /// Load the signing key for `name`
    pub fn keypair(&self, name: &str) -> Result<Secp256k1KeyPair> {
        validate_key_name(name)?;
        self.store.get(name)?.keypair()
    }
}

/// Check a key name: ASCII alphanumerics, `_`, `-` and `.`, starting and
/// ending with an alphanumeric or `_`.
pub fn validate_key_name(name: &str) -> Result<()> {
    let edge_ok = |c: char| c.is_ascii_alphanumeric() || c == '_';

    let valid = match (name.chars().next(), name.chars().last()) {
        (Some(first), Some(last)) => {
            edge_ok(first)
                && edge_ok(last)
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(SignerError::InvalidInput(format!("invalid key name: {:?}", name)))
    }
}
