//! Mining engine
//!
//! Proof-of-work is a resumable search over a fixed block template. Each
//! `step` hashes one nonce; callers drive the loop, observe progress, cancel
//! between steps or shard the nonce space across threads.

use crate::core::{unix_millis, Block, Chain, ChainError, ConsensusParams, Difficulty, Ledger, Transaction};
use crate::crypto::{meets_target, u256_to_hex64};
use crate::mining::coinbase::build_coinbase;
use crate::mining::difficulty::{hash_target, retarget};
use log::{debug, info};
use primitive_types::U256;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use thiserror::Error;

/// Mining errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MiningError {
    #[error("Cannot assemble block: {0}")]
    Chain(#[from] ChainError),
    #[error("Mining cancelled after {0} attempts")]
    Cancelled(u64),
}

/// Result of one search step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The hash missed the target; the search moved on to this nonce
    Continue(u64),
    /// The block's hash meets its target
    Found(Block),
}

/// Progress hooks for a running search. Every method defaults to a no-op.
pub trait MiningObserver {
    /// Called once before the first step with the hash target
    fn on_target(&mut self, _target: &U256) {}

    /// Called after every unsuccessful step with the next nonce to try
    fn on_attempt(&mut self, _nonce: u64) {}

    /// Called when a solution is found
    fn on_found(&mut self, _block: &Block, _attempts: u64) {}
}

impl MiningObserver for () {}

/// Logs search progress every `interval` attempts
#[derive(Debug, Clone)]
pub struct ProgressLogger {
    interval: u64,
    attempts: u64,
}

impl ProgressLogger {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            attempts: 0,
        }
    }
}

impl MiningObserver for ProgressLogger {
    fn on_target(&mut self, target: &U256) {
        debug!("Searching for a hash below {}", u256_to_hex64(target));
    }

    fn on_attempt(&mut self, nonce: u64) {
        self.attempts += 1;
        if self.attempts % self.interval == 0 {
            debug!("Still mining: {} attempts, next nonce {}", self.attempts, nonce);
        }
    }

    fn on_found(&mut self, block: &Block, attempts: u64) {
        debug!("Nonce {} found after {} attempts", block.header.nonce, attempts);
    }
}

/// Nonce search over one block template
#[derive(Debug, Clone)]
pub struct MiningSearch {
    block: Block,
    target: U256,
    stride: u64,
    attempts: u64,
}

impl MiningSearch {
    /// Search `block` starting from its current nonce
    pub fn new(block: Block, target: U256) -> Self {
        Self {
            block,
            target,
            stride: 1,
            attempts: 0,
        }
    }

    /// The template in its current state
    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn target(&self) -> &U256 {
        &self.target
    }

    /// Nonce the next step will test
    pub fn nonce(&self) -> u64 {
        self.block.header.nonce
    }

    /// Hashes tested so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Test the current nonce. On a miss, advance to the next nonce in this
    /// search's share of the nonce space.
    pub fn step(&mut self) -> SearchOutcome {
        self.attempts += 1;
        if meets_target(&self.block.hash, &self.target) {
            return SearchOutcome::Found(self.block.clone());
        }

        let next = self.block.header.nonce.wrapping_add(self.stride);
        self.block.set_nonce(next);
        SearchOutcome::Continue(next)
    }

    /// Split into `workers` searches over disjoint nonces: worker `i` tests
    /// `nonce + i`, `nonce + i + workers`, and so on.
    pub fn partition(self, workers: usize) -> Vec<MiningSearch> {
        let workers = workers.max(1) as u64;
        let start = self.nonce();
        (0..workers)
            .map(|offset| {
                let mut part = self.clone();
                part.block.set_nonce(start.wrapping_add(offset * self.stride));
                part.stride = self.stride.wrapping_mul(workers);
                part.attempts = 0;
                part
            })
            .collect()
    }

    /// Step until a solution is found or `keep_going` turns false.
    ///
    /// `keep_going` is checked before every step.
    pub fn run_while<O, F>(&mut self, observer: &mut O, mut keep_going: F) -> Option<Block>
    where
        O: MiningObserver + ?Sized,
        F: FnMut() -> bool,
    {
        observer.on_target(&self.target);
        while keep_going() {
            match self.step() {
                SearchOutcome::Found(block) => {
                    observer.on_found(&block, self.attempts);
                    return Some(block);
                }
                SearchOutcome::Continue(nonce) => observer.on_attempt(nonce),
            }
        }
        debug!("Search stopped after {} attempts", self.attempts);
        None
    }

    /// Step until a solution is found or `cancel` is set
    pub fn run<O>(&mut self, observer: &mut O, cancel: &AtomicBool) -> Option<Block>
    where
        O: MiningObserver + ?Sized,
    {
        self.run_while(observer, || !cancel.load(Ordering::Relaxed))
    }
}

/// Search on `workers` threads; the first solution wins and stops the rest.
///
/// Returns the block and the attempts made across all workers, or `None`
/// with the attempts when `cancel` was set first.
pub fn mine_parallel(
    search: MiningSearch,
    workers: usize,
    cancel: &AtomicBool,
) -> (Option<Block>, u64) {
    let solved = AtomicBool::new(false);
    let (sender, receiver) = mpsc::channel();
    let parts = search.partition(workers);

    let attempts = thread::scope(|scope| {
        let handles: Vec<_> = parts
            .into_iter()
            .map(|mut part| {
                let sender = sender.clone();
                let solved = &solved;
                scope.spawn(move || {
                    let keep_going =
                        || !solved.load(Ordering::Relaxed) && !cancel.load(Ordering::Relaxed);
                    if let Some(block) = part.run_while(&mut (), keep_going) {
                        solved.store(true, Ordering::Relaxed);
                        let _ = sender.send(block);
                    }
                    part.attempts()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(0))
            .sum::<u64>()
    });
    drop(sender);

    (receiver.try_recv().ok(), attempts)
}

/// Assemble the template for the next block on top of `head` (`None` mines
/// genesis) and return the search that will solve it.
///
/// The coinbase pays `miner_address` the reward plus fees. The timestamp is
/// the current time, never earlier than the parent's.
pub fn mine(
    params: &ConsensusParams,
    chain: &Chain,
    ledger: &Ledger,
    head: Option<&Block>,
    transactions: Vec<Transaction>,
    miner_address: &str,
) -> Result<MiningSearch, MiningError> {
    let timestamp = head.map_or_else(unix_millis, |head| unix_millis().max(head.timestamp()));
    let coinbase = build_coinbase(
        params,
        chain,
        ledger,
        head,
        &transactions,
        miner_address,
        timestamp,
    )?;

    let mut all_transactions = Vec::with_capacity(transactions.len() + 1);
    all_transactions.push(coinbase);
    all_transactions.extend(transactions);

    let mut block = Block::new(
        params,
        head.map_or(0, |head| head.height() + 1),
        head.map(|head| head.hash.clone()),
        timestamp,
        Difficulty::ONE,
        all_transactions,
    );
    block.header.difficulty = retarget(params, chain, &block)?;
    block.set_nonce(0);

    let target = hash_target(params, block.difficulty());
    Ok(MiningSearch::new(block, target))
}

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    fn new(hash_attempts: u64, started: Instant) -> Self {
        let time_ms = started.elapsed().as_millis();
        let hash_rate = if time_ms > 0 {
            (hash_attempts as f64) / (time_ms as f64 / 1000.0)
        } else {
            hash_attempts as f64
        };
        Self {
            hash_attempts,
            time_ms,
            hash_rate,
        }
    }
}

/// Miner for creating new blocks
#[derive(Debug, Clone)]
pub struct Miner {
    /// Miner's address for receiving rewards
    pub address: String,
    /// Search threads
    pub workers: usize,
}

impl Miner {
    /// Create a single-threaded miner
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            workers: 1,
        }
    }

    /// Use `workers` search threads
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Mine a block on top of `head` with the given transactions.
    ///
    /// The block is returned, not inserted; the caller adds it to the chain.
    pub fn mine_block(
        &self,
        params: &ConsensusParams,
        chain: &Chain,
        ledger: &Ledger,
        head: Option<&Block>,
        transactions: Vec<Transaction>,
    ) -> Result<(Block, MiningStats), MiningError> {
        self.mine_block_until(params, chain, ledger, head, transactions, &AtomicBool::new(false))
    }

    /// Like `mine_block`, giving up once `cancel` is set
    pub fn mine_block_until(
        &self,
        params: &ConsensusParams,
        chain: &Chain,
        ledger: &Ledger,
        head: Option<&Block>,
        transactions: Vec<Transaction>,
        cancel: &AtomicBool,
    ) -> Result<(Block, MiningStats), MiningError> {
        let start = Instant::now();
        let mut search = mine(params, chain, ledger, head, transactions, &self.address)?;

        info!(
            "Mining block {} with difficulty {}...",
            search.block().height(),
            search.block().difficulty()
        );

        let (found, attempts) = if self.workers > 1 {
            mine_parallel(search, self.workers, cancel)
        } else {
            let found = search.run(&mut ProgressLogger::new(100_000), cancel);
            (found, search.attempts())
        };

        let Some(block) = found else {
            info!("Mining cancelled after {} attempts", attempts);
            return Err(MiningError::Cancelled(attempts));
        };

        let stats = MiningStats::new(attempts, start);
        info!(
            "Block {} mined in {}ms (nonce {}, {} attempts, {:.2} H/s)",
            block.height(),
            stats.time_ms,
            block.header.nonce,
            stats.hash_attempts,
            stats.hash_rate
        );

        Ok((block, stats))
    }
}
