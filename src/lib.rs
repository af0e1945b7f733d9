//! secpsign - secp256k1 key management and signing
//!
//! Generates, imports, stores and exports secp256k1 keys and signs with them
//! in two flavors:
//! - Cosmos: 64-byte `R || S` with low-S enforced
//! - EVM: recoverable `(v, r, s)`, legacy or EIP-155
//!
//! Storage goes through a pluggable [`keystore::StorageBackend`], with
//! in-memory and password-sealed file backends bundled.

pub mod api;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod keystore;
pub mod logging;
pub mod security;
pub mod signer;

pub use api::SignerService;
pub use config::Config;
pub use errors::{Result, SignerError};
pub use keystore::{KeyManager, KeyStore, StorageBackend};
pub use logging::init_logging;
