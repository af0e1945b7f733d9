//! Zeroizing containers for transient key material
//!
//! Decoded import payloads and exported private keys pass through
//! [`SecureBytes`], which wipes its buffer on drop. The `zeroize` crate keeps
//! the compiler from eliding the wipe.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{Secret, SecretString};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A byte buffer that zeros its memory on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureBytes {
    inner: Vec<u8>,
}

impl SecureBytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self { inner: data }
    }

    /// Decode standard padded base64 straight into a zeroizing buffer.
    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(encoded).map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn expose(&self) -> &[u8] {
        &self.inner
    }

    /// Encode as standard padded base64.
    ///
    /// The returned string is ordinary heap memory; callers hand it to the
    /// transport and should not keep it around.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.inner)
    }
}

impl From<Vec<u8>> for SecureBytes {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for SecureBytes {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl std::fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureBytes([REDACTED; {}])", self.inner.len())
    }
}

/// Wrap a password read from the environment.
pub fn new_secret_string(value: String) -> SecretString {
    Secret::new(value)
}
