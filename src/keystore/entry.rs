//! Persisted key record
//!
//! Stored as JSON under `keys/<name>`. Byte fields are standard padded base64
//! strings and `created_at` is RFC 3339 UTC, e.g.
//!
//! ```json
//! {"private_key":"...","public_key":"...","public_key_uncompressed":"...",
//!  "exportable":false,"created_at":"2024-01-01T00:00:00Z","imported":false}
//! ```

use crate::crypto::keypair::Secp256k1KeyPair;
use crate::errors::{Result, SignerError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// A stored secp256k1 key
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Raw 32-byte private scalar
    #[serde(with = "base64_bytes")]
    pub private_key: Vec<u8>,

    /// 33-byte compressed public key
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,

    /// 65-byte uncompressed public key
    #[serde(
        default,
        with = "base64_bytes_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub public_key_uncompressed: Option<Vec<u8>>,

    /// Set once at creation/import; there is no update path
    pub exportable: bool,

    pub created_at: DateTime<Utc>,

    /// True if the key came from Import rather than Create
    pub imported: bool,
}

impl KeyEntry {
    /// Build an entry from key material, deriving both public key encodings.
    pub fn from_keypair(keypair: &Secp256k1KeyPair, exportable: bool, imported: bool) -> Self {
        Self {
            private_key: keypair.private_key_bytes().expose().to_vec(),
            public_key: keypair.public_key_compressed(),
            public_key_uncompressed: Some(keypair.public_key_uncompressed()),
            exportable,
            created_at: Utc::now(),
            imported,
        }
    }

    /// Rebuild the key pair from the stored scalar
    pub fn keypair(&self) -> Result<Secp256k1KeyPair> {
        Secp256k1KeyPair::from_bytes(&self.private_key)
    }

    /// Serialize for the storage collaborator
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize and check that the public key still matches the scalar.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let entry: KeyEntry = serde_json::from_slice(data)?;
        entry.check_consistency()?;
        Ok(entry)
    }

    /// Creation time in RFC 3339, second precision
    pub fn created_at_rfc3339(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn check_consistency(&self) -> Result<()> {
        let keypair = self
            .keypair()
            .map_err(|e| SignerError::StorageError(format!("corrupt key entry: {}", e)))?;

        if keypair.public_key_compressed() != self.public_key {
            return Err(SignerError::StorageError(
                "corrupt key entry: public key does not match private key".to_string(),
            ));
        }
        if let Some(uncompressed) = &self.public_key_uncompressed {
            if keypair.public_key_uncompressed() != *uncompressed {
                return Err(SignerError::StorageError(
                    "corrupt key entry: uncompressed public key does not match private key"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Drop for KeyEntry {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl std::fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEntry")
            .field("public_key", &hex::encode(&self.public_key))
            .field("exportable", &self.exportable)
            .field("created_at", &self.created_at)
            .field("imported", &self.imported)
            .finish_non_exhaustive()
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

mod base64_bytes_opt {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}
