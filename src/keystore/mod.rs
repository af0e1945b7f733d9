//! Key storage and management
//!
//! This module provides:
//! - The storage collaborator trait and its in-memory and encrypted file backends
//! - The persisted key record
//! - The cached key store
//! - Key lifecycle operations

pub mod backend;
pub mod encrypted;
pub mod entry;
pub mod manager;
pub mod memory;
pub mod store;

pub use backend::StorageBackend;
pub use encrypted::{EncryptedFileBackend, KdfParams};
pub use entry::KeyEntry;
pub use manager::{validate_key_name, ExportedKey, KeyManager, KeyMetadata};
pub use memory::MemoryBackend;
pub use store::{KeyStore, DEFAULT_KEY_PREFIX};
