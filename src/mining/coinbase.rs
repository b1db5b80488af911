//! Coinbase assembly
//!
//! The coinbase of a block pays the block reward for its height plus every
//! fee its transactions leave behind, in a single output.

use crate::core::{Block, Chain, ChainError, ConsensusParams, Ledger, Transaction, UtxoSet};
use log::{debug, warn};

/// Total fees left by `transactions` if they were mined on top of `head`.
///
/// Inputs are resolved against `head`'s UTXO set updated by each preceding
/// transaction, so chained spends inside one block are priced correctly.
/// Inputs that resolve to nothing contribute zero; the total never goes
/// below zero.
pub fn total_fees(
    chain: &Chain,
    ledger: &Ledger,
    head: Option<&Block>,
    transactions: &[Transaction],
) -> Result<u64, ChainError> {
    let mut view = match head {
        Some(head) => (*ledger.utxo_set(chain, head)?).clone(),
        None => UtxoSet::new(),
    };

    let mut fees: i128 = 0;
    for tx in transactions {
        let mut inputs: i128 = 0;
        for input in &tx.inputs {
            match view.find(&input.tx_hash, input.out_index) {
                Some(utxo) => inputs += i128::from(utxo.amount),
                None => warn!(
                    "Transaction {} spends unknown output {}:{}",
                    tx.hash, input.tx_hash, input.out_index
                ),
            }
        }
        let outputs: i128 = tx.outputs.iter().map(|output| i128::from(output.amount)).sum();
        fees += inputs - outputs;
        view.apply(tx);
    }

    Ok(u64::try_from(fees.max(0)).unwrap_or(u64::MAX))
}

/// Build the coinbase for a block mined on top of `head` (`None` for
/// genesis) carrying `transactions`.
pub fn build_coinbase(
    params: &ConsensusParams,
    chain: &Chain,
    ledger: &Ledger,
    head: Option<&Block>,
    transactions: &[Transaction],
    miner_address: &str,
    timestamp: i64,
) -> Result<Transaction, ChainError> {
    let height = head.map_or(0, |head| head.height() + 1);
    let reward = params.block_reward(height);
    let fees = total_fees(chain, ledger, head, transactions)?;

    debug!(
        "Coinbase for height {}: reward {} + fees {} to {}",
        height, reward, fees, miner_address
    );

    Ok(Transaction::coinbase(
        params,
        miner_address,
        reward.saturating_add(fees),
        timestamp,
    ))
}
