//! Signature encoding conversions
//!
//! The ECDSA primitive hands back an ASN.1 DER `SEQUENCE { INTEGER r, INTEGER s }`.
//! Cosmos wants the fixed 64-byte `R || S` form with `S` in the lower half of
//! the curve order (BIP-62). DER parsing goes through the vetted decoder in
//! `k256`/`ecdsa`, which strips the sign-disambiguation zero byte and
//! left-pads each integer to 32 bytes.

use crate::errors::{Result, SignerError};
use k256::ecdsa::{RecoveryId, Signature};
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, Scalar};

/// Length of a compact `R || S` signature
pub const COMPACT_SIGNATURE_LEN: usize = 64;

/// Convert a DER signature into compact `R || S`, normalizing to low-S.
///
/// This is the only place the Cosmos signing path normalizes `S`.
pub fn der_to_compact(der: &[u8]) -> Result<[u8; COMPACT_SIGNATURE_LEN]> {
    let signature = Signature::from_der(der)
        .map_err(|_| SignerError::SignatureInvalid("malformed DER signature".to_string()))?;

    let (signature, _) = normalize_low_s(signature);

    let mut compact = [0u8; COMPACT_SIGNATURE_LEN];
    compact.copy_from_slice(&signature.to_bytes());
    Ok(compact)
}

/// Replace `S` with `n - S` when `S > n/2`.
///
/// Returns the normalized signature and whether `S` was flipped.
pub fn normalize_low_s(signature: Signature) -> (Signature, bool) {
    match signature.normalize_s() {
        Some(normalized) => (normalized, true),
        None => (signature, false),
    }
}

/// Normalize a recoverable signature, keeping the recovery id consistent.
///
/// Negating `S` mirrors the nonce point, which flips the parity of its
/// y-coordinate.
pub fn normalize_recoverable(
    signature: Signature,
    recovery_id: RecoveryId,
) -> (Signature, RecoveryId) {
    let (signature, flipped) = normalize_low_s(signature);
    if flipped {
        let recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
        (signature, recovery_id)
    } else {
        (signature, recovery_id)
    }
}

/// Whether `S` already sits in the lower half of the curve order
#[cfg(test)]
pub(crate) fn is_low_s(signature: &Signature) -> bool {
    signature.normalize_s().is_none()
}

/// Parse compact `R || S` into a signature.
///
/// Each half is read as a 32-byte big-endian scalar. A half that is zero or
/// not below the curve order is rejected outright rather than reduced.
pub fn compact_to_signature(compact: &[u8]) -> Result<Signature> {
    if compact.len() != COMPACT_SIGNATURE_LEN {
        return Err(SignerError::InvalidInput(format!(
            "signature must be {} bytes, got {}",
            COMPACT_SIGNATURE_LEN,
            compact.len()
        )));
    }

    let r = parse_scalar(&compact[..32], "r")?;
    let s = parse_scalar(&compact[32..], "s")?;

    Signature::from_scalars(r, s)
        .map_err(|_| SignerError::InvalidInput("invalid signature scalars".to_string()))
}

/// Split a compact signature into its big-endian halves
pub fn split_compact(compact: &[u8; COMPACT_SIGNATURE_LEN]) -> ([u8; 32], [u8; 32]) {
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[..32]);
    s.copy_from_slice(&compact[32..]);
    (r, s)
}

fn parse_scalar(bytes: &[u8], label: &str) -> Result<FieldBytes> {
    let field = FieldBytes::clone_from_slice(bytes);

    if bool::from(Scalar::from_repr(field).is_none()) {
        return Err(SignerError::InvalidInput(format!(
            "{} value overflows the curve order",
            label
        )));
    }
    if bytes.iter().all(|b| *b == 0) {
        return Err(SignerError::InvalidInput(format!("{} value is zero", label)));
    }

    Ok(field)
}
