//! Cryptographic collaborators of the consensus engine
//!
//! This module provides:
//! - SHA-256 hashing and 256-bit hash interpretation
//! - ECDSA key management (secp256k1) and Base58Check addresses
//! - Merkle root calculation

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{double_sha256, hash_to_u256, meets_target, sha256, sha256_hex, u256_to_hex64};
pub use keys::{
    address_of, address_of_hex, is_valid_address, public_key_from_hex, sign_digest,
    verify_digest, KeyError, KeyPair,
};
pub use merkle::calculate_merkle_root;
