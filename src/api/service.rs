//! Caller-facing operations
//!
//! Framework-agnostic request handlers. Binary payloads travel as standard
//! padded base64; public keys and Cosmos addresses as lowercase hex; Ethereum
//! addresses as `0x`-prefixed EIP-55.

use crate::config::{BackendKind, Config};
use crate::crypto::address::ethereum_address_from_public_key;
use crate::crypto::hash::sha256;
use crate::crypto::keypair::encode_public_key;
use crate::errors::{Result, SignerError};
use crate::keystore::{
    EncryptedFileBackend, KeyManager, KeyMetadata, KeyStore, MemoryBackend, StorageBackend,
};
use crate::signer::{cosmos, evm, require_hash32, HASH_LEN};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroize;

/// Version under which exported key material is returned
const EXPORT_KEY_VERSION: &str = "1";

/// Public key metadata, returned by create, import and read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyResponse {
    pub name: String,
    #[serde(rename = "public_key")]
    pub public_key_hex: String,
    #[serde(rename = "address")]
    pub cosmos_address_hex: String,
    pub eth_address: String,
    pub exportable: bool,
    pub created_at: String,
    pub imported: bool,
}

impl From<KeyMetadata> for KeyResponse {
    fn from(meta: KeyMetadata) -> Self {
        Self {
            name: meta.name,
            public_key_hex: meta.public_key_hex,
            cosmos_address_hex: meta.cosmos_address_hex,
            eth_address: meta.eth_address,
            exportable: meta.exportable,
            created_at: meta.created_at,
            imported: meta.imported,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListKeysResponse {
    pub keys: Vec<String>,
    pub key_info: BTreeMap<String, KeyResponse>,
}

/// Exported key material. Secret fields are wiped on drop.
#[derive(Serialize)]
pub struct ExportKeyResponse {
    pub name: String,
    #[serde(rename = "public_key")]
    pub public_key_hex: String,
    #[serde(rename = "address")]
    pub cosmos_address_hex: String,
    /// Raw 32-byte scalar, base64
    pub private_key: String,
    /// Same material keyed by version
    pub keys: BTreeMap<String, String>,
    pub created_at: String,
    pub imported: bool,
}

impl std::fmt::Debug for ExportKeyResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportKeyResponse")
            .field("name", &self.name)
            .field("public_key_hex", &self.public_key_hex)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

impl Drop for ExportKeyResponse {
    fn drop(&mut self) {
        self.private_key.zeroize();
        for value in self.keys.values_mut() {
            value.zeroize();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignResponse {
    /// Compact 64-byte `R || S`, base64
    pub signature: String,
    #[serde(rename = "public_key")]
    pub public_key_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignEvmResponse {
    #[serde(rename = "v")]
    pub v_hex: String,
    #[serde(rename = "r")]
    pub r_hex: String,
    #[serde(rename = "s")]
    pub s_hex: String,
    pub v_int: u64,
    #[serde(rename = "public_key")]
    pub public_key_hex: String,
    pub eth_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoverEvmResponse {
    /// Compressed recovered key, lowercase hex
    #[serde(rename = "public_key")]
    pub public_key_hex: String,
    pub eth_address: String,
}

/// Digest actually signed for `input`: the input itself when `prehashed`,
/// its SHA-256 otherwise.
pub fn signing_digest(input: &[u8], prehashed: bool) -> Result<[u8; HASH_LEN]> {
    if prehashed {
        Ok(*require_hash32(input)?)
    } else {
        Ok(sha256(input))
    }
}

/// The signing service
pub struct SignerService {
    manager: KeyManager,
}

impl SignerService {
    pub fn new(manager: KeyManager) -> Self {
        Self { manager }
    }

    /// Service over `backend` with the default key prefix and caching
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self::new(KeyManager::new(Arc::new(KeyStore::new(backend))))
    }

    /// Build backend, store and manager from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let backend: Arc<dyn StorageBackend> = match config.storage.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::File => {
                let path = config.storage.path.as_ref().ok_or_else(|| {
                    SignerError::ConfigError("storage.path not set".to_string())
                })?;
                let password = config.master_password()?;
                Arc::new(EncryptedFileBackend::open(
                    path,
                    &password,
                    &config.security.kdf_params(),
                )?)
            }
        };

        let store = KeyStore::with_options(
            backend,
            config.storage.key_prefix.clone(),
            config.cache.enabled,
        );

        info!(
            "Signer service ready (backend: {:?}, cache: {})",
            config.storage.backend, config.cache.enabled
        );
        Ok(Self::new(KeyManager::new(Arc::new(store))))
    }

    pub fn manager(&self) -> &KeyManager {
        &self.manager
    }

    pub fn create_key(&self, name: &str, exportable: bool) -> Result<KeyResponse> {
        self.manager.create(name, exportable).map(KeyResponse::from)
    }

    pub fn import_key(&self, name: &str, private_key_b64: &str, exportable: bool) -> Result<KeyResponse> {
        self.manager
            .import(name, private_key_b64, exportable)
            .map(KeyResponse::from)
    }

    pub fn read_key(&self, name: &str) -> Result<KeyResponse> {
        self.manager.read(name).map(KeyResponse::from)
    }

    pub fn list_keys(&self) -> Result<ListKeysResponse> {
        let metadata = self.manager.list()?;

        let keys = metadata.iter().map(|meta| meta.name.clone()).collect();
        let key_info = metadata
            .into_iter()
            .map(|meta| (meta.name.clone(), KeyResponse::from(meta)))
            .collect();

        Ok(ListKeysResponse { keys, key_info })
    }

    pub fn delete_key(&self, name: &str) -> Result<()> {
        self.manager.delete(name)
    }

    pub fn export_key(&self, name: &str) -> Result<ExportKeyResponse> {
        let exported = self.manager.export(name)?;
        let private_key = exported.private_key.to_base64();

        let mut keys = BTreeMap::new();
        keys.insert(EXPORT_KEY_VERSION.to_string(), private_key.clone());

        let meta = &exported.metadata;
        Ok(ExportKeyResponse {
            name: meta.name.clone(),
            public_key_hex: meta.public_key_hex.clone(),
            cosmos_address_hex: meta.cosmos_address_hex.clone(),
            private_key,
            keys,
            created_at: meta.created_at.clone(),
            imported: meta.imported,
        })
    }

    /// Cosmos-style sign. `input_b64` is hashed with SHA-256 unless
    /// `prehashed`, in which case it must already be a 32-byte digest.
    pub fn sign(&self, name: &str, input_b64: &str, prehashed: bool) -> Result<SignResponse> {
        let input = STANDARD.decode(input_b64)?;
        let digest = signing_digest(&input, prehashed)?;

        let keypair = self.manager.keypair(name)?;
        let signature = cosmos::sign(&keypair, &digest)?;

        debug!("Signed with key: {} (prehashed: {})", name, prehashed);
        Ok(SignResponse {
            signature: STANDARD.encode(signature),
            public_key_hex: hex::encode(keypair.public_key_compressed()),
        })
    }

    /// EVM sign over a 32-byte digest. A zero or absent chain id signs legacy.
    pub fn sign_evm(&self, name: &str, hash_b64: &str, chain_id: Option<u64>) -> Result<SignEvmResponse> {
        let hash = STANDARD.decode(hash_b64)?;
        require_hash32(&hash)?;

        let keypair = self.manager.keypair(name)?;
        let signature = evm::sign(&keypair, &hash, chain_id)?;

        debug!("EVM signed with key: {} (chain id: {:?})", name, chain_id);
        Ok(SignEvmResponse {
            v_hex: signature.v_hex(),
            r_hex: signature.r_hex(),
            s_hex: signature.s_hex(),
            v_int: signature.v,
            public_key_hex: hex::encode(keypair.public_key_compressed()),
            eth_address: keypair.eth_address_checksum()?,
        })
    }

    /// Check a compact signature against a stored key
    pub fn verify(
        &self,
        name: &str,
        input_b64: &str,
        signature_b64: &str,
        prehashed: bool,
    ) -> Result<VerifyResponse> {
        let input = STANDARD.decode(input_b64)?;
        let signature = STANDARD.decode(signature_b64)?;
        let digest = signing_digest(&input, prehashed)?;

        let meta = self.manager.read(name)?;
        let public_key = hex::decode(&meta.public_key_hex)?;
        let valid = cosmos::verify(&public_key, &digest, &signature)?;

        Ok(VerifyResponse { valid })
    }

    /// Recover the signer of an EVM signature. Needs no stored key.
    pub fn recover_evm(
        &self,
        hash_b64: &str,
        r_hex: &str,
        s_hex: &str,
        v: u64,
        chain_id: Option<u64>,
    ) -> Result<RecoverEvmResponse> {
        let hash = STANDARD.decode(hash_b64)?;
        let r = decode_signature_hex(r_hex)?;
        let s = decode_signature_hex(s_hex)?;

        let verifying_key = evm::recover_public_key(&hash, &r, &s, v, chain_id)?;
        let uncompressed = encode_public_key(&verifying_key, false);

        Ok(RecoverEvmResponse {
            public_key_hex: hex::encode(encode_public_key(&verifying_key, true)),
            eth_address: ethereum_address_from_public_key(&uncompressed)?,
        })
    }
}

fn decode_signature_hex(value: &str) -> Result<Vec<u8>> {
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value).map_err(|e| SignerError::SignatureInvalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::keccak256;

    fn new_service() -> SignerService {
        SignerService::with_backend(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn test_signing_digest_modes() {
        let hash = sha256(b"hello");
        assert_eq!(signing_digest(b"hello", false).unwrap(), hash);
        assert_eq!(signing_digest(&hash, true).unwrap(), hash);
        assert!(matches!(
            signing_digest(b"hello", true),
            Err(SignerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sign_and_verify() {
        let service = new_service();
        let created = service.create_key("k", false).unwrap();

        let input = STANDARD.encode(b"hello");
        let signed = service.sign("k", &input, false).unwrap();
        assert_eq!(signed.public_key_hex, created.public_key_hex);
        assert_eq!(STANDARD.decode(&signed.signature).unwrap().len(), 64);

        assert!(service.verify("k", &input, &signed.signature, false).unwrap().valid);

        // Same digest passed prehashed gives the same signature
        let digest = STANDARD.encode(sha256(b"hello"));
        let prehashed = service.sign("k", &digest, true).unwrap();
        assert_eq!(prehashed.signature, signed.signature);

        let other = STANDARD.encode(b"other");
        assert!(!service.verify("k", &other, &signed.signature, false).unwrap().valid);
    }

    #[test]
    fn test_sign_errors() {
        let service = new_service();
        service.create_key("k", false).unwrap();

        assert!(matches!(
            service.sign("missing", &STANDARD.encode(b"x"), false),
            Err(SignerError::KeyNotFound(_))
        ));
        assert!(matches!(
            service.sign("k", "%%%", false),
            Err(SignerError::InvalidInput(_))
        ));
        assert!(matches!(
            service.sign("k", &STANDARD.encode([0u8; 31]), true),
            Err(SignerError::InvalidInput(_))
        ));
        assert!(matches!(
            service.sign_evm("k", &STANDARD.encode([0u8; 33]), Some(1)),
            Err(SignerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sign_evm_and_recover() {
        let service = new_service();
        let created = service.create_key("k", false).unwrap();
        let hash = STANDARD.encode(keccak256(b"hello"));

        for (chain_id, expected) in [(Some(10), [55, 56]), (Some(1), [37, 38]), (Some(0), [27, 28]), (None, [27, 28])] {
            let signed = service.sign_evm("k", &hash, chain_id).unwrap();
            assert!(expected.contains(&signed.v_int));
            assert_eq!(signed.v_hex, format!("{:x}", signed.v_int));
            assert_eq!(signed.r_hex.len(), 64);
            assert_eq!(signed.s_hex.len(), 64);
            assert_eq!(signed.eth_address, created.eth_address);

            let recovered = service
                .recover_evm(&hash, &signed.r_hex, &signed.s_hex, signed.v_int, chain_id)
                .unwrap();
            assert_eq!(recovered.public_key_hex, created.public_key_hex);
            assert_eq!(recovered.eth_address, created.eth_address);
        }
    }

    #[test]
    fn test_recover_evm_rejects_bad_v() {
        let service = new_service();
        service.create_key("k", false).unwrap();
        let hash = STANDARD.encode(keccak256(b"hello"));
        let signed = service.sign_evm("k", &hash, None).unwrap();

        assert!(matches!(
            service.recover_evm(&hash, &signed.r_hex, &signed.s_hex, 29, None),
            Err(SignerError::SignatureInvalid(_))
        ));
        assert!(matches!(
            service.recover_evm(&hash, "zz", &signed.s_hex, 27, None),
            Err(SignerError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_export_shape() {
        let service = new_service();
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        let encoded = STANDARD.encode(bytes);
        service.import_key("one", &encoded, true).unwrap();

        let exported = service.export_key("one").unwrap();
        assert_eq!(exported.private_key, encoded);
        assert_eq!(exported.keys.get("1"), Some(&encoded));
        assert!(exported.imported);
        assert!(!format!("{:?}", exported).contains(&encoded));

        let json = serde_json::to_value(&exported).unwrap();
        assert_eq!(json["keys"]["1"], encoded.as_str());
        assert_eq!(json["address"], "751e76e8199196d454941c45d1b3a323f1433bd6");
    }

    #[test]
    fn test_list_keys_shape() {
        let service = new_service();
        assert!(service.list_keys().unwrap().keys.is_empty());

        service.create_key("a", false).unwrap();
        service.create_key("b", true).unwrap();

        let listed = service.list_keys().unwrap();
        let mut names = listed.keys.clone();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert!(listed.key_info["b"].exportable);

        let json = serde_json::to_value(&listed).unwrap();
        assert!(json["key_info"]["a"]["eth_address"].is_string());
    }

    #[test]
    fn test_from_config_memory() {
        let service = SignerService::from_config(&Config::default()).unwrap();
        service.create_key("k", false).unwrap();
        assert_eq!(service.manager().store().cached_len(), 1);
    }

    #[test]
    fn test_from_config_file_requires_password() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.backend = BackendKind::File;
        config.storage.path = Some(dir.path().to_path_buf());
        config.security.master_password_env = "SECPSIGN_TEST_NO_SUCH_PASSWORD".to_string();

        assert!(matches!(
            SignerService::from_config(&config),
            Err(SignerError::ConfigError(_))
        ));
    }
}
