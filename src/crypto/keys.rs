//! ECDSA key management and address encoding
//!
//! Provides key pair generation, signing, and verification using
//! the secp256k1 elliptic curve (same as Bitcoin), plus the Base58Check
//! address scheme parameterised by the network's prefix and checksum length.

use rand::rngs::OsRng;
use ripemd::Ripemd160;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::hash::double_sha256;
use crate::core::ConsensusParams;

/// Length of a RIPEMD-160 public key hash
const PUBKEY_HASH_LEN: usize = 20;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid message digest: expected 32 bytes of hex")]
    InvalidDigest,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_secret_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Address of this key pair on the given network
    pub fn address(&self, params: &ConsensusParams) -> String {
        address_of(params, &self.public_key)
    }

    /// Sign a hex message digest, returning a hex compact signature
    pub fn sign(&self, digest_hex: &str) -> Result<String, KeyError> {
        sign_digest(&self.secret_key, digest_hex)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

fn checksum(params: &ConsensusParams, payload: &[u8]) -> Vec<u8> {
    let digest = double_sha256(payload);
    digest[..params.checksum_len.min(digest.len())].to_vec()
}

/// Convert a public key to an address:
/// Base58(prefix || RIPEMD160(SHA256(pubkey)) || checksum)
pub fn address_of(params: &ConsensusParams, public_key: &PublicKey) -> String {
    let sha256_hash = Sha256::digest(public_key.serialize());

    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256_hash);
    let ripemd_hash = ripemd.finalize();

    let mut address_bytes = vec![params.address_prefix];
    address_bytes.extend_from_slice(&ripemd_hash);

    let check = checksum(params, &address_bytes);
    address_bytes.extend_from_slice(&check);

    bs58::encode(address_bytes).into_string()
}

/// Address of a hex-encoded compressed public key
pub fn address_of_hex(params: &ConsensusParams, public_key_hex: &str) -> Result<String, KeyError> {
    Ok(address_of(params, &public_key_from_hex(public_key_hex)?))
}

/// Check an address's length, network prefix and checksum
pub fn is_valid_address(params: &ConsensusParams, address: &str) -> bool {
    let Ok(bytes) = bs58::decode(address).into_vec() else {
        return false;
    };
    if bytes.len() != 1 + PUBKEY_HASH_LEN + params.checksum_len {
        return false;
    }
    if bytes[0] != params.address_prefix {
        return false;
    }
    let (payload, check) = bytes.split_at(1 + PUBKEY_HASH_LEN);
    checksum(params, payload) == check
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

fn digest_message(digest_hex: &str) -> Result<Message, KeyError> {
    let digest = hex::decode(digest_hex).map_err(|_| KeyError::InvalidDigest)?;
    if digest.len() != 32 {
        return Err(KeyError::InvalidDigest);
    }
    Ok(Message::from_digest_slice(&digest)?)
}

/// Sign a 32-byte hex digest with a secret key
pub fn sign_digest(secret_key: &SecretKey, digest_hex: &str) -> Result<String, KeyError> {
    let secp = Secp256k1::new();
    let message = digest_message(digest_hex)?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(hex::encode(signature.serialize_compact()))
}

/// Verify a hex signature over a hex digest.
///
/// Malformed keys, digests or signatures simply fail verification.
pub fn verify_digest(public_key_hex: &str, digest_hex: &str, signature_hex: &str) -> bool {
    let secp = Secp256k1::verification_only();

    let Ok(public_key) = public_key_from_hex(public_key_hex) else {
        return false;
    };
    let Ok(message) = digest_message(digest_hex) else {
        return false;
    };
    let Some(signature) = hex::decode(signature_hex)
        .ok()
        .and_then(|bytes| Signature::from_compact(&bytes).ok())
    else {
        return false;
    };

    secp.verify_ecdsa(&message, &signature, &public_key).is_ok()
}
