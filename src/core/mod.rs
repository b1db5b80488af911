//! Core consensus data
//!
//! This module contains the fundamental building blocks:
//! - Consensus parameters
//! - Transactions (UTXO model, single-signer ECDSA)
//! - Blocks (merkle-committed, proof of work header)
//! - Chain index (all branches sorted by height and timestamp)
//! - Ledger (memoized UTXO and transaction sets per block)

pub mod block;
pub mod chain;
pub mod ledger;
pub mod params;
pub mod transaction;
pub mod utxo;

pub use block::{Block, BlockHeader, Difficulty};
pub use chain::{Ancestry, Chain, ChainError};
pub use ledger::Ledger;
pub use params::{ConsensusParams, ParamsError, COIN, MILLI};
pub use transaction::{
    build_transaction, unix_millis, Transaction, TransactionBuilder, TransactionError,
    TransactionInput, TransactionKind, TransactionOutput,
};
pub use utxo::{Utxo, UtxoSet};
