//! Error types for secpsign

use thiserror::Error;

/// Main error type for secpsign operations
#[derive(Error, Debug)]
pub enum SignerError {
    // Input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Key management errors
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Key already exists: {0}")]
    KeyExists(String),

    #[error("Key is not exportable: {0}")]
    KeyNotExportable(String),

    #[error("Invalid secp256k1 key: {0}")]
    InvalidKey(String),

    // Cryptographic errors
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    #[error("Public key recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    // Storage errors
    #[error("Storage error: {0}")]
    StorageError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Internal errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl SignerError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            SignerError::InvalidInput(_) => "invalid_input",
            SignerError::KeyNotFound(_) => "key_not_found",
            SignerError::KeyExists(_) => "key_exists",
            SignerError::KeyNotExportable(_) => "key_not_exportable",
            SignerError::InvalidKey(_) => "invalid_key",
            SignerError::SignatureInvalid(_) => "signature_invalid",
            SignerError::RecoveryFailed(_) => "recovery_failed",
            SignerError::SigningFailed(_) => "signing_failed",
            SignerError::EncryptionFailed(_) => "encryption_failed",
            SignerError::DecryptionFailed(_) => "decryption_failed",
            SignerError::StorageError(_) => "storage_error",
            SignerError::ConfigError(_) => "config_error",
            SignerError::InternalError(_) => "internal_error",
        }
    }

    /// Whether a caller may retry the operation unchanged.
    ///
    /// Only the storage collaborator's own I/O failures qualify; everything
    /// else is deterministic for a given input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SignerError::StorageError(_))
    }
}

impl From<std::io::Error> for SignerError {
    fn from(err: std::io::Error) -> Self {
        SignerError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for SignerError {
    fn from(err: serde_json::Error) -> Self {
        SignerError::StorageError(format!("JSON error: {}", err))
    }
}

impl From<hex::FromHexError> for SignerError {
    fn from(err: hex::FromHexError) -> Self {
        SignerError::InvalidInput(format!("Hex decode error: {}", err))
    }
}

impl From<base64::DecodeError> for SignerError {
    fn from(err: base64::DecodeError) -> Self {
        SignerError::InvalidInput(format!("Base64 decode error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, SignerError>;
