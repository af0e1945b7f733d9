//! secp256k1 key material
//!
//! Provides:
//! - Key generation from the OS CSPRNG
//! - Validation of raw 32-byte scalars on import
//! - Compressed and uncompressed SEC1 public key encodings

use crate::crypto::address::{checksum_address, ethereum_address};
use crate::errors::{Result, SignerError};
use crate::security::SecureBytes;
use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;

/// Raw private key length
pub const PRIVATE_KEY_LEN: usize = 32;

/// SEC1 compressed public key length (`0x02|0x03 || X`)
pub const COMPRESSED_PUBLIC_KEY_LEN: usize = 33;

/// SEC1 uncompressed public key length (`0x04 || X || Y`)
pub const UNCOMPRESSED_PUBLIC_KEY_LEN: usize = 65;

/// secp256k1 key pair
///
/// The wrapped `SigningKey` zeroizes its scalar on drop.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Create a new random key pair
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Create from raw private key bytes.
    ///
    /// The input must be exactly 32 bytes encoding a scalar in `[1, n-1]`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(SignerError::InvalidKey(format!(
                "private key must be {} bytes, got {}",
                PRIVATE_KEY_LEN,
                bytes.len()
            )));
        }

        let signing_key = SigningKey::from_slice(bytes).map_err(|_| {
            SignerError::InvalidKey("scalar is zero or not below the curve order".to_string())
        })?;

        Ok(Self { signing_key })
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Get the public key (compressed, 33 bytes)
    pub fn public_key_compressed(&self) -> Vec<u8> {
        encode_public_key(self.verifying_key(), true)
    }

    /// Get the public key (uncompressed, 65 bytes with 0x04 prefix)
    pub fn public_key_uncompressed(&self) -> Vec<u8> {
        encode_public_key(self.verifying_key(), false)
    }

    /// Get the checksummed Ethereum address string
    pub fn eth_address_checksum(&self) -> Result<String> {
        let address = ethereum_address(&self.public_key_uncompressed())?;
        Ok(checksum_address(&address))
    }

    /// Export the private key bytes (use with caution!)
    pub fn private_key_bytes(&self) -> SecureBytes {
        SecureBytes::new(self.signing_key.to_bytes().to_vec())
    }
}

impl std::fmt::Debug for Secp256k1KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secp256k1KeyPair")
            .field("public_key", &hex::encode(self.public_key_compressed()))
            .finish_non_exhaustive()
    }
}

/// SEC1-encode a verifying key
pub fn encode_public_key(verifying_key: &VerifyingKey, compress: bool) -> Vec<u8> {
    verifying_key.to_encoded_point(compress).as_bytes().to_vec()
}

/// Parse a compressed or uncompressed SEC1 public key
pub fn parse_public_key(bytes: &[u8]) -> Result<VerifyingKey> {
    if bytes.is_empty() {
        return Err(SignerError::InvalidInput(
            "public key data cannot be empty".to_string(),
        ));
    }
    VerifyingKey::from_sec1_bytes(bytes)
        .map_err(|_| SignerError::InvalidInput("failed to parse public key".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURVE_ORDER: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";

    #[test]
    fn test_key_generation() {
        let keypair = Secp256k1KeyPair::generate();
        assert_eq!(keypair.public_key_compressed().len(), 33);
        assert_eq!(keypair.public_key_uncompressed().len(), 65);
        assert_eq!(keypair.public_key_uncompressed()[0], 0x04);
        assert_eq!(keypair.private_key_bytes().len(), 32);
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let a = Secp256k1KeyPair::generate();
        let b = Secp256k1KeyPair::generate();
        assert_ne!(a.public_key_compressed(), b.public_key_compressed());
    }

    #[test]
    fn test_from_bytes_round_trip() {
        let private_key =
            hex::decode("0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef")
                .unwrap();

        let keypair = Secp256k1KeyPair::from_bytes(&private_key).unwrap();
        assert_eq!(keypair.private_key_bytes().expose(), private_key.as_slice());

        let addr = keypair.eth_address_checksum().unwrap();
        assert!(addr.starts_with("0x"));
        assert_eq!(addr.len(), 42);
    }

    #[test]
    fn test_eth_address_matches_public_key_derivation() {
        let mut private_key = [0u8; 32];
        private_key[31] = 1;
        let keypair = Secp256k1KeyPair::from_bytes(&private_key).unwrap();

        let addr = keypair.eth_address_checksum().unwrap();
        assert_eq!(addr, "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
        assert_eq!(
            addr,
            crate::crypto::address::ethereum_address_from_public_key(
                &keypair.public_key_compressed()
            )
            .unwrap()
        );
    }

    #[test]
    fn test_rejects_wrong_length() {
        for len in [0usize, 16, 31, 33, 64] {
            let err = Secp256k1KeyPair::from_bytes(&vec![1u8; len]).unwrap_err();
            assert!(matches!(err, SignerError::InvalidKey(_)), "len {}", len);
        }
    }

    #[test]
    fn test_rejects_zero_and_order() {
        assert!(matches!(
            Secp256k1KeyPair::from_bytes(&[0u8; 32]),
            Err(SignerError::InvalidKey(_))
        ));

        let order = hex::decode(CURVE_ORDER).unwrap();
        assert!(matches!(
            Secp256k1KeyPair::from_bytes(&order),
            Err(SignerError::InvalidKey(_))
        ));

        assert!(matches!(
            Secp256k1KeyPair::from_bytes(&[0xffu8; 32]),
            Err(SignerError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_accepts_order_minus_one() {
        let mut bytes = hex::decode(CURVE_ORDER).unwrap();
        bytes[31] -= 1;
        assert!(Secp256k1KeyPair::from_bytes(&bytes).is_ok());
    }

    #[test]
    fn test_parse_public_key_both_forms() {
        let keypair = Secp256k1KeyPair::generate();
        let a = parse_public_key(&keypair.public_key_compressed()).unwrap();
        let b = parse_public_key(&keypair.public_key_uncompressed()).unwrap();
        assert_eq!(a, b);
        assert!(parse_public_key(&[]).is_err());
        assert!(parse_public_key(&[0x05; 33]).is_err());
    }
}
