//! Chain index
//!
//! Every known block, across all branches, kept sorted by height and then by
//! timestamp. Branches share a genesis block and are followed through
//! `previous_hash` links.

use crate::core::block::Block;
use crate::core::ledger::Ledger;
use crate::core::params::ConsensusParams;
use crate::validation::validate_chain;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chain lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Previous block {0} not found")]
    NotFound(String),
    #[error("Block {hash} has fewer than {depth} ancestors")]
    MissingAncestor { hash: String, depth: u64 },
    #[error("Block {0} is not one height above its parent")]
    HeightGap(String),
}

/// All known blocks, sorted by (height, timestamp)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from blocks in any order
    pub fn from_blocks(mut blocks: Vec<Block>) -> Self {
        blocks.sort_by_key(|block| (block.height(), block.timestamp()));
        Self { blocks }
    }

    /// Insert a block after the last block at or below its (height, timestamp)
    pub fn insert(&mut self, block: Block) {
        let key = (block.height(), block.timestamp());
        let position = self
            .blocks
            .iter()
            .rposition(|existing| (existing.height(), existing.timestamp()) <= key)
            .map_or(0, |i| i + 1);

        debug!(
            "Indexing block {} at height {} (position {})",
            block.hash,
            block.height(),
            position
        );
        self.blocks.insert(position, block);
    }

    /// Find a block by hash
    pub fn get(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().rev().find(|block| block.hash == hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.get(hash).is_some()
    }

    /// The parent of a block. Never call this on a genesis block.
    pub fn previous_of(&self, block: &Block) -> Result<&Block, ChainError> {
        let previous_hash = block.previous_hash().unwrap_or_default();
        self.get(previous_hash)
            .ok_or_else(|| ChainError::NotFound(previous_hash.to_string()))
    }

    /// The parent of a block, which must sit exactly one height below it.
    ///
    /// Every ancestry walk steps through this, so heights strictly decrease
    /// and a walk over cyclic or self-linked blocks still terminates.
    pub fn linked_parent(&self, block: &Block) -> Result<&Block, ChainError> {
        let parent = self.previous_of(block)?;
        if parent.height().checked_add(1) != Some(block.height()) {
            return Err(ChainError::HeightGap(block.hash.clone()));
        }
        Ok(parent)
    }

    /// The block `depth` links behind `block` (depth 1 is its parent)
    pub fn ancestor<'a>(&'a self, block: &'a Block, depth: u64) -> Result<&'a Block, ChainError> {
        let mut current = block;
        for _ in 0..depth {
            if current.previous_hash().is_none() {
                return Err(ChainError::MissingAncestor {
                    hash: block.hash.clone(),
                    depth,
                });
            }
            current = self.linked_parent(current)?;
        }
        Ok(current)
    }

    /// Iterate from `head` back towards genesis. Stops early at a broken link
    /// or a height gap.
    pub fn ancestry<'a>(&'a self, head: &'a Block) -> Ancestry<'a> {
        Ancestry {
            chain: self,
            next: Some(head),
        }
    }

    /// The tip of the best chain: the highest block whose whole ancestry
    /// validates, earliest timestamp first among equals. Falls back to lower
    /// heights when nothing at the top validates.
    pub fn best_block(&self, params: &ConsensusParams, ledger: &Ledger) -> Option<&Block> {
        let mut end = self.blocks.len();
        while end > 0 {
            let height = self.blocks[end - 1].height();
            let start = self.blocks[..end]
                .iter()
                .rposition(|block| block.height() != height)
                .map_or(0, |i| i + 1);

            for candidate in &self.blocks[start..end] {
                match validate_chain(params, self, ledger, candidate) {
                    Ok(()) => return Some(candidate),
                    Err(rejection) => debug!(
                        "Skipping candidate {} at height {}: {}",
                        candidate.hash, height, rejection
                    ),
                }
            }
            end = start;
        }
        None
    }

    /// Number of blocks from the best block back to `block`, both included.
    /// Zero when `block` is not on the best chain.
    pub fn confirmations(&self, params: &ConsensusParams, ledger: &Ledger, block: &Block) -> u64 {
        self.best_block(params, ledger)
            .map_or(0, |best| self.confirmations_from(best, block))
    }

    /// Number of blocks from `head` back to `block`, both included
    pub fn confirmations_from(&self, head: &Block, block: &Block) -> u64 {
        let mut count = 0;
        for ancestor in self.ancestry(head) {
            count += 1;
            if ancestor.hash == block.hash {
                return count;
            }
            if ancestor.height() < block.height() {
                break;
            }
        }
        0
    }

    /// Highest block in the index regardless of validity
    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Iterator over a block and its ancestors
pub struct Ancestry<'a> {
    chain: &'a Chain,
    next: Option<&'a Block>,
}

impl<'a> Iterator for Ancestry<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        if current.previous_hash().is_some() {
            self.next = self.chain.linked_parent(current).ok();
        }
        Some(current)
    }
}
