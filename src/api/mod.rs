//! API layer for secpsign
//!
//! Provides the caller-facing key management and signing operations.

pub mod service;

pub use service::{
    signing_digest, ExportKeyResponse, KeyResponse, ListKeysResponse, RecoverEvmResponse,
    SignEvmResponse, SignResponse, SignerService, VerifyResponse,
};
