//! Address derivation
//!
//! Both address forms are pure functions of the public key:
//! - Cosmos: `RIPEMD160(SHA256(compressed_pubkey))`, 20 bytes, bare lowercase hex
//! - Ethereum: last 20 bytes of `Keccak256(uncompressed_pubkey[1..])`,
//!   EIP-55 mixed-case checksum with a `0x` prefix

use crate::crypto::hash::{hash160, keccak256};
use crate::crypto::keypair::{
    encode_public_key, parse_public_key, COMPRESSED_PUBLIC_KEY_LEN, UNCOMPRESSED_PUBLIC_KEY_LEN,
};
use crate::errors::{Result, SignerError};

/// Cosmos account address bytes from a 33-byte compressed public key
pub fn cosmos_address(compressed: &[u8]) -> Result<[u8; 20]> {
    if compressed.len() != COMPRESSED_PUBLIC_KEY_LEN {
        return Err(SignerError::InvalidInput(format!(
            "compressed public key must be {} bytes, got {}",
            COMPRESSED_PUBLIC_KEY_LEN,
            compressed.len()
        )));
    }
    Ok(hash160(compressed))
}

/// Cosmos address as lowercase hex without prefix
pub fn cosmos_address_hex(compressed: &[u8]) -> Result<String> {
    cosmos_address(compressed).map(hex::encode)
}

/// Ethereum address bytes from a 65-byte uncompressed public key
pub fn ethereum_address(uncompressed: &[u8]) -> Result<[u8; 20]> {
    if uncompressed.len() != UNCOMPRESSED_PUBLIC_KEY_LEN || uncompressed[0] != 0x04 {
        return Err(SignerError::InvalidInput(
            "uncompressed public key must be 65 bytes starting with 0x04".to_string(),
        ));
    }
    // Skip the 0x04 prefix and hash the remaining 64 bytes
    let hash = keccak256(&uncompressed[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Ok(address)
}

/// Checksummed Ethereum address from a public key in either SEC1 form.
///
/// Stored entries may only carry the compressed key, so the point is
/// decompressed first when needed.
pub fn ethereum_address_from_public_key(public_key: &[u8]) -> Result<String> {
    let address = if public_key.len() == UNCOMPRESSED_PUBLIC_KEY_LEN {
        ethereum_address(public_key)?
    } else {
        let verifying_key = parse_public_key(public_key)?;
        ethereum_address(&encode_public_key(&verifying_key, false))?
    };
    Ok(checksum_address(&address))
}

/// Convert an address to checksummed format (EIP-55)
pub fn checksum_address(address: &[u8; 20]) -> String {
    let addr_hex = hex::encode(address);
    let hash = keccak256(addr_hex.as_bytes());

    let mut result = String::with_capacity(42);
    result.push_str("0x");

    for (i, c) in addr_hex.chars().enumerate() {
        // High nibble for even positions, low nibble for odd ones
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            result.push(c.to_ascii_uppercase());
        } else {
            result.push(c);
        }
    }

    result
}
