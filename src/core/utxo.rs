//! Unspent transaction outputs
//!
//! A `UtxoSet` is an ordered list: outputs are appended in the order their
//! transactions were applied, and input selection walks that order.

use crate::core::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Unspent Transaction Output (UTXO)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    /// Hash of the transaction that created the output
    pub tx_hash: String,
    /// Position of the output in that transaction
    pub out_index: u32,
    /// Owning address
    pub address: String,
    /// Amount in smallest units
    pub amount: u64,
}

/// Ordered set of unspent outputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet {
    entries: Vec<Utxo>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a transaction: consume the outputs its inputs reference, then
    /// append its own outputs.
    ///
    /// Each input removes at most one matching entry. Inputs that match
    /// nothing are ignored here; validation reports them.
    pub fn apply(&mut self, tx: &Transaction) {
        for input in &tx.inputs {
            if let Some(position) = self.position(&input.tx_hash, input.out_index) {
                self.entries.remove(position);
            }
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            self.entries.push(Utxo {
                tx_hash: tx.hash.clone(),
                out_index: index as u32,
                address: output.address.clone(),
                amount: output.amount,
            });
        }
    }

    fn position(&self, tx_hash: &str, out_index: u32) -> Option<usize> {
        self.entries
            .iter()
            .position(|utxo| utxo.tx_hash == tx_hash && utxo.out_index == out_index)
    }

    /// Find a UTXO by transaction hash and output index
    pub fn find(&self, tx_hash: &str, out_index: u32) -> Option<&Utxo> {
        self.position(tx_hash, out_index).map(|i| &self.entries[i])
    }

    /// UTXOs owned by an address, in set order
    pub fn owned_by<'a>(&'a self, address: &'a str) -> impl Iterator<Item = &'a Utxo> + 'a {
        self.entries.iter().filter(move |utxo| utxo.address == address)
    }

    /// Sum of the amounts owned by an address
    pub fn balance(&self, address: &str) -> u64 {
        self.owned_by(address)
            .fold(0u64, |acc, utxo| acc.saturating_add(utxo.amount))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
