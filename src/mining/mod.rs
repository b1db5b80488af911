//! Proof-of-work: difficulty retargeting, coinbase assembly and the nonce
//! search

pub mod coinbase;
pub mod difficulty;
pub mod miner;

pub use coinbase::{build_coinbase, total_fees};
pub use difficulty::{correction_factor, hash_target, retarget};
pub use miner::{
    mine, mine_parallel, Miner, MiningError, MiningObserver, MiningSearch, MiningStats,
    ProgressLogger, SearchOutcome,
};
