//! Cryptographic hashing utilities for the consensus engine
//!
//! Every commitment in the chain (transaction hashes, block hashes, merkle
//! nodes, pre-images) is a lowercase hex SHA-256 digest of a canonical string.

use primitive_types::U256;
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
/// Used for address checksums
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Interprets a 64-character hex digest as a big-endian 256-bit integer.
///
/// Returns `None` for anything that is not exactly 32 bytes of hex.
pub fn hash_to_u256(hash: &str) -> Option<U256> {
    let bytes = hex::decode(hash).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    Some(U256::from_big_endian(&bytes))
}

/// Checks if a hex digest is numerically at or below the hash target
pub fn meets_target(hash: &str, target: &U256) -> bool {
    hash_to_u256(hash).map_or(false, |value| value <= *target)
}

/// Formats a 256-bit value as a zero-padded 64-character hex string
pub fn u256_to_hex64(value: &U256) -> String {
    format!("{:064x}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        let hash = sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(
            sha256_hex(data),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_double_sha256() {
        let data = b"hello world";
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
    }

    #[test]
    fn test_hash_to_u256() {
        let one = format!("{}1", "0".repeat(63));
        assert_eq!(hash_to_u256(&one), Some(U256::one()));
        assert_eq!(hash_to_u256(&"f".repeat(64)), Some(U256::MAX));
        assert_eq!(hash_to_u256("abcd"), None);
        assert_eq!(hash_to_u256("not hex"), None);
    }

    #[test]
    fn test_meets_target() {
        let target = U256::from(0x1000u64);
        let below = format!("{}0fff", "0".repeat(60));
        let equal = format!("{}1000", "0".repeat(60));
        let above = format!("{}1001", "0".repeat(60));
        assert!(meets_target(&below, &target));
        assert!(meets_target(&equal, &target));
        assert!(!meets_target(&above, &target));
        assert!(!meets_target("garbage", &target));
    }

    #[test]
    fn test_u256_to_hex64_round_trip() {
        let value = U256::MAX / U256::from(16u64);
        let hex = u256_to_hex64(&value);
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("0fff"));
        assert_eq!(hash_to_u256(&hex), Some(value));
    }
}
