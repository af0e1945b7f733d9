//! Encrypted file storage backend
//!
//! One JSON file per storage key (`keys/alice` -> `<base>/keys/alice.json`).
//! Each value is sealed with AES-256-GCM; the storage key is bound as
//! associated data so a file copied under another name fails to open.
//! The AES key is derived once per directory from a master password with
//! Argon2id and a random salt kept in `<base>/.salt`.

use crate::errors::{Result, SignerError};
use crate::keystore::backend::{validate_storage_key, StorageBackend};
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Salt size for Argon2
const SALT_SIZE: usize = 16;

/// Nonce size for AES-GCM
const NONCE_SIZE: usize = 12;

/// Salt file name inside the base directory
const SALT_FILE: &str = ".salt";

/// Sealed value format version
const FORMAT_VERSION: u32 = 1;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Parallel lanes
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MB memory
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// On-disk format of one sealed value
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedValue {
    /// Version of the encryption format
    version: u32,

    /// Nonce for AES-GCM (base64)
    nonce: String,

    /// Encrypted value (base64)
    ciphertext: String,
}

impl SealedValue {
    fn seal(cipher: &Aes256Gcm, key: &str, plaintext: &[u8]) -> Result<Self> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|e| SignerError::EncryptionFailed(e.to_string()))?;

        Ok(Self {
            version: FORMAT_VERSION,
            nonce: STANDARD.encode(nonce_bytes),
            ciphertext: STANDARD.encode(ciphertext),
        })
    }

    fn open(&self, cipher: &Aes256Gcm, key: &str) -> Result<Vec<u8>> {
        if self.version != FORMAT_VERSION {
            return Err(SignerError::DecryptionFailed(format!(
                "unsupported format version {}",
                self.version
            )));
        }

        let nonce_bytes = STANDARD
            .decode(&self.nonce)
            .map_err(|e| SignerError::DecryptionFailed(format!("Invalid nonce: {}", e)))?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(SignerError::DecryptionFailed(
                "Invalid nonce length".to_string(),
            ));
        }

        let ciphertext = STANDARD
            .decode(&self.ciphertext)
            .map_err(|e| SignerError::DecryptionFailed(format!("Invalid ciphertext: {}", e)))?;

        cipher
            .decrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &ciphertext,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|_| {
                SignerError::DecryptionFailed("Decryption failed - wrong password?".to_string())
            })
    }
}

/// Derive an encryption key from a password using Argon2id
fn derive_key(password: &str, salt: &[u8], params: &KdfParams) -> Result<Zeroizing<[u8; 32]>> {
    let params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| SignerError::EncryptionFailed(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut output[..])
        .map_err(|e| SignerError::EncryptionFailed(e.to_string()))?;

    Ok(output)
}

/// Encrypted directory-backed storage
pub struct EncryptedFileBackend {
    base_path: PathBuf,
    cipher: Aes256Gcm,
}

impl EncryptedFileBackend {
    /// Open (or initialize) encrypted storage at the given path
    pub fn open(
        base_path: impl AsRef<Path>,
        password: &SecretString,
        params: &KdfParams,
    ) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        // Create directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
            info!("Created keystore directory {:?}", base_path);
        }

        let salt = load_or_create_salt(&base_path)?;
        let key = derive_key(password.expose_secret(), &salt, params)?;
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| SignerError::EncryptionFailed(e.to_string()))?;

        Ok(Self { base_path, cipher })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the path for a storage key
    fn value_path(&self, key: &str) -> Result<PathBuf> {
        validate_storage_key(key)?;
        let mut path = self.base_path.clone();
        let mut segments = key.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                // Names may contain dots, so append rather than set_extension
                path.push(format!("{}.json", segment));
            }
        }
        Ok(path)
    }

    /// Seal `value` into a temp file next to `path` and return the temp path
    fn write_temp(&self, key: &str, path: &Path, value: &[u8]) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let sealed = SealedValue::seal(&self.cipher, key, value)?;
        let json = serde_json::to_vec_pretty(&sealed)?;

        let mut suffix = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut suffix);
        let temp_path = path.with_extension(format!("tmp-{}", hex::encode(suffix)));

        create_private_file(&temp_path, |file| write_synced(file, &json))?;
        Ok(temp_path)
    }
}

impl StorageBackend for EncryptedFileBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.value_path(key)?;
        let json = match fs::read(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let sealed: SealedValue = serde_json::from_slice(&json)?;
        sealed.open(&self.cipher, key).map(Some)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.value_path(key)?;
        let temp_path = self.write_temp(key, &path, value)?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        debug!("Stored encrypted value: {}", key);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.value_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted encrypted value: {}", key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let dir_key = prefix.trim_end_matches('/');
        if dir_key.is_empty() {
            return Ok(Vec::new());
        }
        validate_storage_key(dir_key)?;

        let mut dir = self.base_path.clone();
        for segment in dir_key.split('/') {
            dir.push(segment);
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().to_string());
                }
            }
        }

        Ok(names)
    }

    fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool> {
        let path = self.value_path(key)?;
        let temp_path = self.write_temp(key, &path, value)?;

        // hard_link refuses to replace an existing file, which makes the
        // existence check and the write a single filesystem operation
        let linked = fs::hard_link(&temp_path, &path);
        let _ = fs::remove_file(&temp_path);

        match linked {
            Ok(()) => {
                debug!("Stored encrypted value: {}", key);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn load_or_create_salt(base_path: &Path) -> Result<Vec<u8>> {
    let salt_path = base_path.join(SALT_FILE);

    match fs::read(&salt_path) {
        Ok(salt) if salt.len() == SALT_SIZE => return Ok(salt),
        Ok(_) => {
            return Err(SignerError::StorageError(format!(
                "corrupt salt file {:?}",
                salt_path
            )))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let mut salt = vec![0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);

    match create_private_file(&salt_path, |file| write_synced(file, &salt)) {
        Ok(()) => Ok(salt),
        // Another process initialized the directory first
        Err(e) if e.kind() == ErrorKind::AlreadyExists => load_or_create_salt(base_path),
        Err(e) => Err(e.into()),
    }
}

/// Exclusively create `path` with owner-only permissions and fill it.
///
/// If `fill` fails the half-written file is removed. A file that already
/// existed is never touched.
fn create_private_file<F>(path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path)?;
    if let Err(e) = fill(&mut file) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

fn write_synced(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::new_secret_string;
    use tempfile::tempdir;

    fn fast_params() -> KdfParams {
        KdfParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn open(path: &Path, password: &str) -> EncryptedFileBackend {
        EncryptedFileBackend::open(path, &new_secret_string(password.to_string()), &fast_params())
            .unwrap()
    }

    #[test]
    fn test_put_get_round_trip() {
        let dir = tempdir().unwrap();
        let backend = open(dir.path(), "test_password");

        backend.put("keys/alice", b"secret value").unwrap();
        assert_eq!(
            backend.get("keys/alice").unwrap().unwrap(),
            b"secret value"
        );
        assert!(backend.get("keys/bob").unwrap().is_none());

        // Plaintext never hits the disk
        let raw = fs::read(dir.path().join("keys").join("alice.json")).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("secret value"));
    }

    #[test]
    fn test_reopen_with_same_password() {
        let dir = tempdir().unwrap();
        open(dir.path(), "pw").put("keys/a", b"1").unwrap();

        let reopened = open(dir.path(), "pw");
        assert_eq!(reopened.get("keys/a").unwrap().unwrap(), b"1");
    }

    #[test]
    fn test_wrong_password() {
        let dir = tempdir().unwrap();
        open(dir.path(), "correct_password")
            .put("keys/a", b"1")
            .unwrap();

        let wrong = open(dir.path(), "wrong_password");
        assert!(matches!(
            wrong.get("keys/a"),
            Err(SignerError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_swapped_file_fails_to_open() {
        let dir = tempdir().unwrap();
        let backend = open(dir.path(), "pw");
        backend.put("keys/a", b"1").unwrap();

        fs::copy(
            dir.path().join("keys").join("a.json"),
            dir.path().join("keys").join("b.json"),
        )
        .unwrap();
        assert!(backend.get("keys/b").is_err());
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempdir().unwrap();
        let backend = open(dir.path(), "pw");
        assert!(backend.list("keys/").unwrap().is_empty());

        backend.put("keys/a", b"1").unwrap();
        backend.put("keys/b", b"2").unwrap();

        let mut names = backend.list("keys/").unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);

        backend.delete("keys/a").unwrap();
        backend.delete("keys/a").unwrap();
        assert_eq!(backend.list("keys/").unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn test_put_if_absent() {
        let dir = tempdir().unwrap();
        let backend = open(dir.path(), "pw");

        assert!(backend.put_if_absent("keys/a", b"first").unwrap());
        assert!(!backend.put_if_absent("keys/a", b"second").unwrap());
        assert_eq!(backend.get("keys/a").unwrap().unwrap(), b"first");

        // No temp files left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("keys"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.tmp-0011223344556677");

        let result = create_private_file(&path, |file| {
            file.write_all(b"partial")?;
            Err(io::Error::new(ErrorKind::Other, "device full"))
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_create_private_file_keeps_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("taken.json");
        fs::write(&path, b"original").unwrap();

        let err = create_private_file(&path, |file| write_synced(file, b"new")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&path).unwrap(), b"original");
    }

    #[test]
    fn test_dotted_names_do_not_collide() {
        let dir = tempdir().unwrap();
        let backend = open(dir.path(), "pw");
        backend.put("keys/my.key", b"dotted").unwrap();
        backend.put("keys/my", b"plain").unwrap();

        assert_eq!(backend.get("keys/my.key").unwrap().unwrap(), b"dotted");
        assert_eq!(backend.get("keys/my").unwrap().unwrap(), b"plain");

        let mut names = backend.list("keys/").unwrap();
        names.sort();
        assert_eq!(names, vec!["my".to_string(), "my.key".to_string()]);
    }

    #[test]
    fn test_rejects_traversal() {
        let dir = tempdir().unwrap();
        let backend = open(dir.path(), "pw");
        assert!(matches!(
            backend.put("keys/../escape", b"1"),
            Err(SignerError::InvalidInput(_))
        ));
    }
}
