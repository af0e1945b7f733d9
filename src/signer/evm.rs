//! EVM-compatible recoverable signing
//!
//! Produces `(v, r, s)` with low-S enforced and the recovery id adjusted to
//! match. `v` is `27 + recid` for legacy signatures and
//! `chain_id * 2 + 35 + recid` under EIP-155.

use crate::crypto::codec::{
    compact_to_signature, normalize_recoverable, split_compact, COMPACT_SIGNATURE_LEN,
};
use crate::crypto::keypair::Secp256k1KeyPair;
use crate::errors::{Result, SignerError};
use crate::signer::require_hash32;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use tracing::debug;

const LEGACY_V_OFFSET: u64 = 27;
const EIP155_V_OFFSET: u64 = 35;

/// Recoverable signature in Ethereum's `(v, r, s)` form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmSignature {
    pub v: u64,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl EvmSignature {
    /// `r` as 64 lowercase hex characters, no prefix
    pub fn r_hex(&self) -> String {
        hex::encode(self.r)
    }

    /// `s` as 64 lowercase hex characters, no prefix
    pub fn s_hex(&self) -> String {
        hex::encode(self.s)
    }

    /// `v` in minimal lowercase hex, no prefix
    pub fn v_hex(&self) -> String {
        format!("{:x}", self.v)
    }
}

/// Sign a 32-byte digest with `v = 27 + recid`
pub fn sign_legacy(keypair: &Secp256k1KeyPair, hash: &[u8]) -> Result<EvmSignature> {
    let (signature, recid) = sign_recoverable(keypair, hash)?;
    Ok(to_evm_signature(&signature, LEGACY_V_OFFSET + recid))
}

/// Sign a 32-byte digest with `v = chain_id * 2 + 35 + recid`
pub fn sign_eip155(keypair: &Secp256k1KeyPair, hash: &[u8], chain_id: u64) -> Result<EvmSignature> {
    if chain_id == 0 {
        return Err(SignerError::InvalidInput(
            "EIP-155 chain id must be positive".to_string(),
        ));
    }
    let (signature, recid) = sign_recoverable(keypair, hash)?;
    let v = eip155_base(chain_id)?
        .checked_add(recid)
        .ok_or_else(|| chain_id_too_large(chain_id))?;
    Ok(to_evm_signature(&signature, v))
}

/// EIP-155 when a positive chain id is given, legacy otherwise
pub fn sign(keypair: &Secp256k1KeyPair, hash: &[u8], chain_id: Option<u64>) -> Result<EvmSignature> {
    match chain_id {
        Some(id) if id > 0 => sign_eip155(keypair, hash, id),
        _ => sign_legacy(keypair, hash),
    }
}

/// Extract the recovery id from `v`.
///
/// With a positive chain id, `v` must be EIP-155 encoded; otherwise it must
/// be 27 or 28. Anything else is `SignatureInvalid`.
pub fn recovery_id_from_v(v: u64, chain_id: Option<u64>) -> Result<u8> {
    let base = match chain_id {
        Some(id) if id > 0 => eip155_base(id)?,
        _ => LEGACY_V_OFFSET,
    };
    match v.checked_sub(base) {
        Some(recid @ (0 | 1)) => Ok(recid as u8),
        _ => Err(SignerError::SignatureInvalid(format!(
            "v value {} does not encode a recovery id",
            v
        ))),
    }
}

/// Recover the signer's public key from a digest and `(v, r, s)`
pub fn recover_public_key(
    hash: &[u8],
    r: &[u8],
    s: &[u8],
    v: u64,
    chain_id: Option<u64>,
) -> Result<VerifyingKey> {
    let hash = require_hash32(hash)?;
    let recid = recovery_id_from_v(v, chain_id)?;

    if r.len() != 32 || s.len() != 32 {
        return Err(SignerError::SignatureInvalid(format!(
            "r and s must be 32 bytes each, got {} and {}",
            r.len(),
            s.len()
        )));
    }
    let mut compact = [0u8; COMPACT_SIGNATURE_LEN];
    compact[..32].copy_from_slice(r);
    compact[32..].copy_from_slice(s);

    let signature = compact_to_signature(&compact).map_err(|e| match e {
        SignerError::InvalidInput(msg) => SignerError::SignatureInvalid(msg),
        other => other,
    })?;

    let recovery_id = RecoveryId::new(recid == 1, false);
    VerifyingKey::recover_from_prehash(hash, &signature, recovery_id)
        .map_err(|e| SignerError::RecoveryFailed(e.to_string()))
}

fn sign_recoverable(keypair: &Secp256k1KeyPair, hash: &[u8]) -> Result<(Signature, u64)> {
    let hash = require_hash32(hash)?;

    let (signature, recovery_id) = keypair
        .signing_key()
        .sign_prehash_recoverable(hash)
        .map_err(|e| SignerError::SigningFailed(e.to_string()))?;
    let (signature, recovery_id) = normalize_recoverable(signature, recovery_id);

    // v only carries y parity
    if recovery_id.is_x_reduced() {
        return Err(SignerError::SigningFailed(
            "recovery id not representable in v".to_string(),
        ));
    }

    debug!("Produced EVM signature");
    Ok((signature, recovery_id.is_y_odd() as u64))
}

fn to_evm_signature(signature: &Signature, v: u64) -> EvmSignature {
    let mut compact = [0u8; COMPACT_SIGNATURE_LEN];
    compact.copy_from_slice(&signature.to_bytes());
    let (r, s) = split_compact(&compact);
    EvmSignature { v, r, s }
}

fn eip155_base(chain_id: u64) -> Result<u64> {
    chain_id
        .checked_mul(2)
        .and_then(|doubled| doubled.checked_add(EIP155_V_OFFSET))
        .ok_or_else(|| chain_id_too_large(chain_id))
}

fn chain_id_too_large(chain_id: u64) -> SignerError {
    SignerError::InvalidInput(format!("chain id {} is too large", chain_id))
}
