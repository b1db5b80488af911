//! Block implementation
//!
//! A block is a header committing to its transactions through a merkle root,
//! plus the transactions themselves. The block hash covers the header only.

use crate::core::params::{ConsensusParams, MILLI};
use crate::core::transaction::{Transaction, TransactionKind};
use crate::crypto::{calculate_merkle_root, hash_to_u256, sha256_hex};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Difficulty
// =============================================================================

/// Mining difficulty as a fixed-point number of thousandths.
///
/// `Difficulty::ONE` corresponds to the network's initial hash target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Difficulty(u64);

impl Difficulty {
    pub const ONE: Difficulty = Difficulty(MILLI);

    /// Difficulty from a count of thousandths (1500 = 1.5)
    pub const fn from_milli(milli: u64) -> Self {
        Self(milli)
    }

    /// Whole-number difficulty
    pub const fn from_whole(whole: u64) -> Self {
        Self(whole.saturating_mul(MILLI))
    }

    /// The difficulty in thousandths
    pub const fn milli(self) -> u64 {
        self.0
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.0 / MILLI, self.0 % MILLI)
    }
}

// =============================================================================
// Block Header
// =============================================================================

/// The hashed part of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    /// Distance from genesis
    pub height: u64,
    /// Hash of the parent block; `None` only for genesis
    pub previous_hash: Option<String>,
    /// Merkle root of all transaction hashes, in block order
    pub merkle_root: String,
    /// Creation time in Unix milliseconds
    pub timestamp: i64,
    /// Schema version
    pub version: String,
    /// Difficulty this block was mined at
    pub difficulty: Difficulty,
    /// Nonce used for proof of work
    pub nonce: u64,
}

impl BlockHeader {
    /// Calculate the hash of the block header.
    ///
    /// Field order is part of consensus: height, previous hash, merkle root,
    /// timestamp, version, difficulty, nonce.
    pub fn hash(&self) -> String {
        let data = format!(
            "{}{}{}{}{}{}{}",
            self.height,
            self.previous_hash.as_deref().unwrap_or(""),
            self.merkle_root,
            self.timestamp,
            self.version,
            self.difficulty.milli(),
            self.nonce
        );
        sha256_hex(data.as_bytes())
    }

    /// Whether this header claims to be a genesis header
    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.previous_hash.is_none()
    }
}

// =============================================================================
// Block
// =============================================================================

/// A block in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header
    #[serde(flatten)]
    pub header: BlockHeader,
    /// Transactions, coinbase first
    pub transactions: Vec<Transaction>,
    /// Block hash (cached header hash)
    pub hash: String,
}

impl Block {
    /// Assemble an unmined block (nonce 0) over the given transactions
    pub fn new(
        params: &ConsensusParams,
        height: u64,
        previous_hash: Option<String>,
        timestamp: i64,
        difficulty: Difficulty,
        transactions: Vec<Transaction>,
    ) -> Self {
        let header = BlockHeader {
            height,
            previous_hash,
            merkle_root: Self::calculate_merkle_root(&transactions),
            timestamp,
            version: params.version.clone(),
            difficulty,
            nonce: 0,
        };
        let hash = header.hash();

        Self {
            header,
            transactions,
            hash,
        }
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn previous_hash(&self) -> Option<&str> {
        self.header.previous_hash.as_deref()
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    pub fn difficulty(&self) -> Difficulty {
        self.header.difficulty
    }

    /// Calculate the merkle root from transactions
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> String {
        let tx_hashes: Vec<String> = transactions.iter().map(|tx| tx.hash.clone()).collect();
        calculate_merkle_root(&tx_hashes)
    }

    /// Set the nonce and refresh the cached hash
    pub fn set_nonce(&mut self, nonce: u64) {
        self.header.nonce = nonce;
        self.hash = self.header.hash();
    }

    /// Verify the block's merkle root
    pub fn verify_merkle_root(&self) -> bool {
        Self::calculate_merkle_root(&self.transactions) == self.header.merkle_root
    }

    /// Verify the block hash
    pub fn verify_hash(&self) -> bool {
        self.hash == self.header.hash()
    }

    /// The block hash as a 256-bit integer, if it is well formed
    pub fn hash_value(&self) -> Option<U256> {
        hash_to_u256(&self.hash)
    }

    /// Get the coinbase transaction (first transaction)
    pub fn coinbase_tx(&self) -> Option<&Transaction> {
        self.transactions
            .first()
            .filter(|tx| tx.kind() == TransactionKind::Coinbase)
    }

    /// Transactions after the coinbase slot
    pub fn spending_transactions(&self) -> &[Transaction] {
        self.transactions.get(1..).unwrap_or(&[])
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn coinbase(params: &ConsensusParams) -> Transaction {
        let miner = KeyPair::generate().address(params);
        Transaction::coinbase(params, &miner, params.initial_block_reward, 1)
    }

    #[test]
    fn test_difficulty_display() {
        assert_eq!(Difficulty::ONE.to_string(), "1.000");
        assert_eq!(Difficulty::from_milli(2_500).to_string(), "2.500");
        assert_eq!(Difficulty::from_milli(7).to_string(), "0.007");
        assert_eq!(Difficulty::from_whole(4), Difficulty::from_milli(4_000));
    }

    #[test]
    fn test_new_block_commitments() {
        let params = ConsensusParams::default();
        let block = Block::new(&params, 0, None, 1, Difficulty::ONE, vec![coinbase(&params)]);

        assert!(block.header.is_genesis());
        assert!(block.verify_merkle_root());
        assert!(block.verify_hash());
        assert_eq!(block.header.merkle_root, block.transactions[0].hash);
        assert!(block.coinbase_tx().is_some());
        assert!(block.spending_transactions().is_empty());
    }

    #[test]
    fn test_merkle_root_verification() {
        let params = ConsensusParams::default();
        let mut block = Block::new(&params, 0, None, 1, Difficulty::ONE, vec![coinbase(&params)]);
        assert!(block.verify_merkle_root());

        block.transactions[0].hash = "tampered".to_string();
        assert!(!block.verify_merkle_root());
    }

    #[test]
    fn test_block_hash_verification() {
        let params = ConsensusParams::default();
        let mut block = Block::new(&params, 0, None, 1, Difficulty::ONE, vec![coinbase(&params)]);
        let original = block.hash.clone();

        block.set_nonce(7);
        assert!(block.verify_hash());
        assert_ne!(block.hash, original);

        block.header.nonce += 1;
        assert!(!block.verify_hash());
    }

    #[test]
    fn test_hash_covers_every_header_field() {
        let params = ConsensusParams::default();
        let block = Block::new(&params, 3, Some("ab".into()), 5, Difficulty::ONE, vec![]);
        let base = block.header.hash();

        let mut h = block.header.clone();
        h.height += 1;
        assert_ne!(h.hash(), base);

        let mut h = block.header.clone();
        h.timestamp += 1;
        assert_ne!(h.hash(), base);

        let mut h = block.header.clone();
        h.difficulty = Difficulty::from_milli(1_001);
        assert_ne!(h.hash(), base);

        let mut h = block.header.clone();
        h.previous_hash = Some("ac".into());
        assert_ne!(h.hash(), base);
    }

    #[test]
    fn test_block_json_is_flat() {
        let params = ConsensusParams::default();
        let block = Block::new(&params, 0, None, 1, Difficulty::ONE, vec![coinbase(&params)]);
        let value = serde_json::to_value(&block).unwrap();

        assert_eq!(value["height"], 0);
        assert_eq!(value["difficulty"], 1000);
        assert!(value["previousHash"].is_null());
        assert!(value.get("header").is_none());

        let decoded: Block = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, block);
    }
}
