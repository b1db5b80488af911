//! Memoized ledger views
//!
//! The UTXO set and the confirmed-transaction set of a block are pure
//! functions of its ancestry, so each is derived once per block hash and
//! published into a cache. The `Ledger` owns those caches; sharing one
//! `Ledger` between threads is safe because a racing derivation produces the
//! same value and publication keeps whichever copy landed first.

use crate::core::block::Block;
use crate::core::chain::{Chain, ChainError};
use crate::core::transaction::Transaction;
use crate::core::utxo::{Utxo, UtxoSet};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

type Memo<T> = RwLock<HashMap<String, Arc<T>>>;

/// Per-block-hash caches of derived ledger state
#[derive(Debug, Default)]
pub struct Ledger {
    utxo_sets: Memo<UtxoSet>,
    transaction_sets: Memo<Vec<Transaction>>,
}

fn lookup<T>(memo: &Memo<T>, hash: &str) -> Option<Arc<T>> {
    memo.read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(hash)
        .cloned()
}

fn publish<T>(memo: &Memo<T>, hash: &str, value: T) -> Arc<T> {
    memo.write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(hash.to_string())
        .or_insert_with(|| Arc::new(value))
        .clone()
}

/// Derive a per-block value by folding `apply` over the ancestry of `head`,
/// starting from the nearest cached ancestor (or an empty value at genesis)
/// and publishing every intermediate block's result. Each step must go down
/// exactly one height, which bounds the walk by `head`'s height.
fn derive<T, F>(memo: &Memo<T>, chain: &Chain, head: &Block, apply: F) -> Result<Arc<T>, ChainError>
where
    T: Clone + Default,
    F: Fn(&mut T, &Block),
{
    if let Some(cached) = lookup(memo, &head.hash) {
        return Ok(cached);
    }

    let mut pending = vec![head];
    let mut base = None;
    let mut cursor = head;
    while cursor.previous_hash().is_some() {
        let previous = chain.linked_parent(cursor)?;
        if let Some(cached) = lookup(memo, &previous.hash) {
            base = Some(cached);
            break;
        }
        pending.push(previous);
        cursor = previous;
    }

    debug!(
        "Deriving ledger state for {} block(s) up to {}",
        pending.len(),
        head.hash
    );

    let mut value = base.map(|cached| (*cached).clone()).unwrap_or_default();
    let mut result = None;
    for block in pending.into_iter().rev() {
        apply(&mut value, block);
        result = Some(publish(memo, &block.hash, value.clone()));
    }

    Ok(result.unwrap_or_else(|| Arc::new(value)))
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every memoized set.
    ///
    /// Takes `&mut self`, so no derivation can be in flight.
    pub fn reset(&mut self) {
        self.utxo_sets
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.transaction_sets
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!("Ledger caches reset");
    }

    /// Number of blocks with a memoized UTXO set
    pub fn cached_utxo_sets(&self) -> usize {
        self.utxo_sets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // =========================================================================
    // UTXO views
    // =========================================================================

    /// Unspent outputs after applying every transaction in `head`'s ancestry
    pub fn utxo_set(&self, chain: &Chain, head: &Block) -> Result<Arc<UtxoSet>, ChainError> {
        derive(&self.utxo_sets, chain, head, |set: &mut UtxoSet, block| {
            for tx in &block.transactions {
                set.apply(tx);
            }
        })
    }

    /// `head`'s UTXO set with the pending mempool applied on top, so outputs
    /// of unconfirmed transactions can be spent again
    pub fn mempool_utxo_set(
        &self,
        chain: &Chain,
        head: &Block,
        candidates: &[Transaction],
    ) -> Result<UtxoSet, ChainError> {
        let mut set = (*self.utxo_set(chain, head)?).clone();
        for tx in self.mempool(chain, head, candidates)? {
            set.apply(&tx);
        }
        Ok(set)
    }

    /// Greedily pick UTXOs owned by `address` until `amount` is covered.
    ///
    /// Returns what was found even if it falls short; callers decide whether
    /// the total suffices.
    pub fn select_inputs(
        &self,
        chain: &Chain,
        head: &Block,
        candidates: &[Transaction],
        address: &str,
        amount: u64,
    ) -> Result<Vec<Utxo>, ChainError> {
        let set = self.mempool_utxo_set(chain, head, candidates)?;

        let mut selected = Vec::new();
        let mut total = 0u64;
        for utxo in set.owned_by(address) {
            if total >= amount {
                break;
            }
            total = total.saturating_add(utxo.amount);
            selected.push(utxo.clone());
        }
        Ok(selected)
    }

    /// Confirmed balance of `address` as of `head`
    pub fn balance(&self, chain: &Chain, head: &Block, address: &str) -> Result<u64, ChainError> {
        Ok(self.utxo_set(chain, head)?.balance(address))
    }

    // =========================================================================
    // Transaction views
    // =========================================================================

    /// Every transaction in `head`'s ancestry, `head` included, oldest first
    pub fn confirmed_transactions(
        &self,
        chain: &Chain,
        head: &Block,
    ) -> Result<Arc<Vec<Transaction>>, ChainError> {
        derive(&self.transaction_sets, chain, head, |txs: &mut Vec<Transaction>, block| {
            txs.extend(block.transactions.iter().cloned());
        })
    }

    /// Known transactions not yet confirmed under `head`.
    ///
    /// Coinbase-shaped transactions are never pending: they are minted per
    /// block.
    pub fn mempool(
        &self,
        chain: &Chain,
        head: &Block,
        known: &[Transaction],
    ) -> Result<Vec<Transaction>, ChainError> {
        let confirmed = self.confirmed_transactions(chain, head)?;
        let confirmed: HashSet<&str> = confirmed.iter().map(|tx| tx.hash.as_str()).collect();

        Ok(known
            .iter()
            .filter(|tx| !tx.is_coinbase() && !confirmed.contains(tx.hash.as_str()))
            .cloned()
            .collect())
    }

    /// The block in `head`'s ancestry that contains a transaction
    pub fn transaction_block<'a>(
        &self,
        chain: &'a Chain,
        head: &'a Block,
        tx_hash: &str,
    ) -> Option<&'a Block> {
        chain
            .ancestry(head)
            .find(|block| block.transactions.iter().any(|tx| tx.hash == tx_hash))
    }

    /// Transactions under `head` that pay `address` (received) and that
    /// spend outputs it owned (sent). A transaction can appear in both.
    pub fn address_transactions(
        &self,
        chain: &Chain,
        head: &Block,
        address: &str,
    ) -> Result<(Vec<Transaction>, Vec<Transaction>), ChainError> {
        let transactions = self.confirmed_transactions(chain, head)?;

        let received: Vec<Transaction> = transactions
            .iter()
            .filter(|tx| tx.outputs.iter().any(|output| output.is_owned_by(address)))
            .cloned()
            .collect();

        let sent = transactions
            .iter()
            .filter(|tx| {
                tx.inputs.iter().any(|input| {
                    received.iter().any(|funding| {
                        funding.hash == input.tx_hash
                            && funding
                                .outputs
                                .get(input.out_index as usize)
                                .map_or(false, |output| output.is_owned_by(address))
                    })
                })
            })
            .cloned()
            .collect();

        Ok((received, sent))
    }
}
