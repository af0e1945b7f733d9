//! Cosmos-style ECDSA signing
//!
//! Signatures are 64-byte `R || S` with low-S enforced. The DER output of the
//! primitive goes through [`der_to_compact`], which is where normalization
//! happens.

use crate::crypto::codec::{compact_to_signature, der_to_compact, COMPACT_SIGNATURE_LEN};
use crate::crypto::keypair::{parse_public_key, Secp256k1KeyPair};
use crate::errors::{Result, SignerError};
use crate::signer::require_hash32;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::Signature;
use tracing::debug;

/// Sign a 32-byte digest, returning compact low-S `R || S`
pub fn sign(keypair: &Secp256k1KeyPair, hash: &[u8]) -> Result<[u8; COMPACT_SIGNATURE_LEN]> {
    let hash = require_hash32(hash)?;

    let signature: Signature = keypair
        .signing_key()
        .sign_prehash(hash)
        .map_err(|e| SignerError::SigningFailed(e.to_string()))?;

    let compact = der_to_compact(signature.to_der().as_bytes())?;
    debug!("Produced Cosmos signature");
    Ok(compact)
}

/// Verify a compact signature against a public key and 32-byte digest.
///
/// Malformed input (wrong lengths, a zero or overflowing half) is an error;
/// a well-formed signature that does not verify is `Ok(false)`. High-S
/// signatures are accepted; only signing enforces low-S.
pub fn verify(public_key: &[u8], hash: &[u8], signature: &[u8]) -> Result<bool> {
    let hash = require_hash32(hash)?;
    let verifying_key = parse_public_key(public_key)?;
    let signature = compact_to_signature(signature)?;
    let signature = signature.normalize_s().unwrap_or(signature);

    Ok(verifying_key.verify_prehash(hash, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::codec::is_low_s;
    use crate::crypto::hash::sha256;
    use k256::Scalar;

    #[test]
    fn test_sign_verify_round_trip() {
        let keypair = Secp256k1KeyPair::generate();
        let hash = sha256(b"hello");

        let signature = sign(&keypair, &hash).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(verify(&keypair.public_key_compressed(), &hash, &signature).unwrap());
        assert!(verify(&keypair.public_key_uncompressed(), &hash, &signature).unwrap());
    }

    #[test]
    fn test_signatures_are_low_s() {
        let keypair = Secp256k1KeyPair::generate();
        for i in 0..32u8 {
            let hash = sha256(&[i]);
            let signature = sign(&keypair, &hash).unwrap();
            assert!(is_low_s(&compact_to_signature(&signature).unwrap()));
        }
    }

    #[test]
    fn test_verify_accepts_high_s_twin() {
        let keypair = Secp256k1KeyPair::generate();
        let hash = sha256(b"hello");
        let compact = sign(&keypair, &hash).unwrap();

        // (r, n - s) is the same signature with S in the upper half
        let low = compact_to_signature(&compact).unwrap();
        let s: Scalar = *low.s();
        let r: Scalar = *low.r();
        let high = Signature::from_scalars(r.to_bytes(), (-s).to_bytes()).unwrap();
        assert!(!is_low_s(&high));

        let mut twin = [0u8; COMPACT_SIGNATURE_LEN];
        twin.copy_from_slice(&high.to_bytes());
        assert_ne!(twin, compact);
        assert!(verify(&keypair.public_key_compressed(), &hash, &twin).unwrap());
        assert!(!verify(&keypair.public_key_compressed(), &sha256(b"other"), &twin).unwrap());
    }

    #[test]
    fn test_deterministic_signatures() {
        // RFC 6979 nonces: same key and digest give the same signature
        let keypair = Secp256k1KeyPair::generate();
        let hash = sha256(b"deterministic");
        assert_eq!(sign(&keypair, &hash).unwrap(), sign(&keypair, &hash).unwrap());
    }

    #[test]
    fn test_wrong_key_or_hash_fails_verification() {
        let keypair = Secp256k1KeyPair::generate();
        let other = Secp256k1KeyPair::generate();
        let hash = sha256(b"message");
        let signature = sign(&keypair, &hash).unwrap();

        assert!(!verify(&other.public_key_compressed(), &hash, &signature).unwrap());
        assert!(!verify(
            &keypair.public_key_compressed(),
            &sha256(b"other"),
            &signature
        )
        .unwrap());
    }

    #[test]
    fn test_sign_rejects_bad_hash_length() {
        let keypair = Secp256k1KeyPair::generate();
        for len in [0usize, 20, 31, 33] {
            assert!(matches!(
                sign(&keypair, &vec![0u8; len]),
                Err(SignerError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_verify_rejects_malformed_signature() {
        let keypair = Secp256k1KeyPair::generate();
        let hash = sha256(b"message");
        let public_key = keypair.public_key_compressed();

        assert!(matches!(
            verify(&public_key, &hash, &[1u8; 63]),
            Err(SignerError::InvalidInput(_))
        ));
        assert!(matches!(
            verify(&public_key, &hash, &[0u8; 64]),
            Err(SignerError::InvalidInput(_))
        ));
        assert!(matches!(
            verify(&public_key, &hash, &[0xffu8; 64]),
            Err(SignerError::InvalidInput(_))
        ));
        assert!(matches!(
            verify(&public_key, &hash[..31], &[1u8; 64]),
            Err(SignerError::InvalidInput(_))
        ));
    }
}
