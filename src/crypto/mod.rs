//! secp256k1 primitives: key material, digests, signature encodings, addresses

pub mod address;
pub mod codec;
pub mod hash;
pub mod keypair;

pub use address::{
    checksum_address, cosmos_address, cosmos_address_hex, ethereum_address,
    ethereum_address_from_public_key,
};
pub use codec::{compact_to_signature, der_to_compact, normalize_recoverable};
pub use hash::{hash160, keccak256, sha256};
pub use keypair::{encode_public_key, parse_public_key, Secp256k1KeyPair};
