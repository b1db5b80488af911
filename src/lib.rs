//! Bobcoin: a minimal proof-of-work cryptocurrency consensus engine
//!
//! This crate provides:
//! - Block and transaction hashing with merkle commitments
//! - ECDSA signatures (secp256k1) and Base58Check addresses
//! - A UTXO ledger memoized per block hash over a branching block index
//! - Difficulty retargeting and a resumable, cancellable nonce search
//! - Code-based validation of transactions, coinbases, blocks and chains
//!
//! # Example
//!
//! ```rust
//! use bobcoin::core::{Chain, ConsensusParams, Ledger};
//! use bobcoin::mining::Miner;
//! use bobcoin::validation::{validate_chain, ResultCode};
//! use bobcoin::wallet::Wallet;
//!
//! let params = ConsensusParams::default();
//! let mut chain = Chain::new();
//! let ledger = Ledger::new();
//!
//! // Mine a genesis block paying a fresh wallet
//! let wallet = Wallet::new();
//! let miner = Miner::new(&wallet.address(&params));
//! let (genesis, stats) = miner.mine_block(&params, &chain, &ledger, None, vec![]).unwrap();
//! println!("Mined genesis in {}ms", stats.time_ms);
//! chain.insert(genesis.clone());
//!
//! let result = validate_chain(&params, &chain, &ledger, &genesis);
//! assert_eq!(ResultCode::of(&result), ResultCode::VALID);
//!
//! let balance = wallet.balance(&params, &chain, &ledger, &genesis).unwrap();
//! assert_eq!(balance, params.block_reward(0));
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod validation;
pub mod wallet;

// Re-export commonly used types
pub use core::{Block, Chain, ConsensusParams, Ledger, Transaction, Utxo, UtxoSet};
pub use crypto::KeyPair;
pub use mining::{Miner, MiningSearch, SearchOutcome};
pub use validation::{Rejection, ResultCode};
pub use wallet::Wallet;
