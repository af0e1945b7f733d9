//! Signing engines
//!
//! Both engines sign a caller-supplied 32-byte digest and never hash
//! internally; choosing the digest is the caller's job.

pub mod cosmos;
pub mod evm;

pub use evm::EvmSignature;

use crate::errors::{Result, SignerError};

/// Length of the digest every signing operation takes
pub const HASH_LEN: usize = 32;

/// Borrow `hash` as a 32-byte digest or fail with `InvalidInput`
pub(crate) fn require_hash32(hash: &[u8]) -> Result<&[u8; HASH_LEN]> {
    hash.try_into().map_err(|_| {
        SignerError::InvalidInput(format!(
            "hash must be {} bytes, got {}",
            HASH_LEN,
            hash.len()
        ))
    })
}
