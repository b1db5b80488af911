//! Consensus validation
//!
//! Pure checks over transactions, coinbases, blocks and whole branches.
//! Rule violations come back as a `Rejection`; nothing here panics on
//! untrusted data.

use crate::core::{Block, Chain, ConsensusParams, Ledger, Transaction, UtxoSet};
use crate::crypto::{address_of_hex, is_valid_address, u256_to_hex64, verify_digest};
use crate::mining::{hash_target, retarget};
use crate::validation::codes::Rejection;
use log::debug;

/// Input and output totals of a transaction that passed every check
struct Totals {
    input: u128,
    output: u128,
}

fn has_metadata(version: &str, timestamp: i64) -> bool {
    !version.is_empty() && timestamp > 0
}

fn check_transaction(
    params: &ConsensusParams,
    utxos: &UtxoSet,
    tx: &Transaction,
) -> Result<Totals, Rejection> {
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(Rejection::InvalidLengths);
    }
    if !has_metadata(&tx.version, tx.timestamp) {
        return Err(Rejection::MissingTransactionMetadata);
    }
    if tx.hash != tx.calculate_hash() {
        return Err(Rejection::InvalidTransactionHash);
    }

    let mut output = 0u128;
    for out in &tx.outputs {
        if !is_valid_address(params, &out.address) {
            return Err(Rejection::InvalidOutputAddress);
        }
        output += u128::from(out.amount);
    }

    let mut input = 0u128;
    for tx_input in &tx.inputs {
        let utxo = utxos
            .find(&tx_input.tx_hash, tx_input.out_index)
            .ok_or_else(|| Rejection::MissingUtxo {
                tx_hash: tx_input.tx_hash.clone(),
                out_index: tx_input.out_index,
            })?;
        match address_of_hex(params, &tx_input.public_key) {
            Ok(owner) if owner == utxo.address => {}
            _ => return Err(Rejection::InputKeyMismatch),
        }
        input += u128::from(utxo.amount);
    }

    if input < output {
        return Err(Rejection::Overspend { input, output });
    }

    let signer = tx.sole_signer().ok_or(Rejection::MultipleSenders)?;
    let preimage = tx.preimage();
    for tx_input in &tx.inputs {
        let signature = tx_input.signature.as_deref().unwrap_or_default();
        if !verify_digest(signer, &preimage, signature) {
            return Err(Rejection::InvalidSignature);
        }
    }

    Ok(Totals { input, output })
}

/// Validate a spending transaction against a UTXO view.
///
/// Checks run in order: shape, metadata, hash, output addresses, input
/// resolution and ownership, amounts, single signer, signatures.
pub fn validate_transaction(
    params: &ConsensusParams,
    utxos: &UtxoSet,
    tx: &Transaction,
) -> Result<(), Rejection> {
    check_transaction(params, utxos, tx).map(|_| ())
}

/// Validate the shape of a coinbase. The amount is checked by
/// `validate_block`, which knows the fees.
pub fn validate_coinbase(params: &ConsensusParams, tx: &Transaction) -> Result<(), Rejection> {
    if tx.hash != tx.calculate_hash() {
        return Err(Rejection::InvalidCoinbaseHash);
    }
    if !has_metadata(&tx.version, tx.timestamp) {
        return Err(Rejection::MissingCoinbaseMetadata);
    }
    if !tx.inputs.is_empty() {
        return Err(Rejection::CoinbaseHasInputs);
    }
    let [output] = tx.outputs.as_slice() else {
        return Err(Rejection::CoinbaseOutputCount);
    };
    if !is_valid_address(params, &output.address) {
        return Err(Rejection::InvalidMinerAddress);
    }
    Ok(())
}

/// Validate one block in the context of its ancestry.
///
/// Spending transactions are checked against the parent's UTXO set,
/// updated after each one, so chained spends inside the block succeed and
/// repeated spends of one output fail. The coinbase may claim at most the
/// block reward plus the fees those transactions leave.
pub fn validate_block(
    params: &ConsensusParams,
    chain: &Chain,
    ledger: &Ledger,
    block: &Block,
) -> Result<(), Rejection> {
    if (block.height() == 0) != block.previous_hash().is_none() {
        return Err(Rejection::InvalidHeight);
    }
    if !has_metadata(&block.header.version, block.timestamp()) {
        return Err(Rejection::MissingBlockMetadata);
    }
    let Some(coinbase) = block.transactions.first() else {
        return Err(Rejection::NoTransactions);
    };
    if !block.verify_hash() {
        return Err(Rejection::InvalidBlockHash);
    }

    let expected = retarget(params, chain, block).map_err(|_| Rejection::NoGenesis)?;
    if expected != block.difficulty() {
        return Err(Rejection::InvalidDifficulty {
            expected: expected.to_string(),
            found: block.difficulty().to_string(),
        });
    }

    if !block.verify_merkle_root() {
        return Err(Rejection::InvalidMerkleRoot);
    }

    let target = hash_target(params, block.difficulty());
    match block.hash_value() {
        Some(value) if value <= target => {}
        _ => {
            return Err(Rejection::HashAboveTarget {
                target: u256_to_hex64(&target),
            })
        }
    }

    let mut view = if block.header.is_genesis() {
        UtxoSet::new()
    } else {
        let parent = chain.previous_of(block).map_err(|_| Rejection::NoGenesis)?;
        (*ledger
            .utxo_set(chain, parent)
            .map_err(|_| Rejection::NoGenesis)?)
        .clone()
    };

    let mut fees = 0u128;
    for tx in block.spending_transactions() {
        let totals = check_transaction(params, &view, tx)?;
        fees += totals.input - totals.output;
        view.apply(tx);
    }

    validate_coinbase(params, coinbase)?;
    let amount = coinbase.outputs[0].amount;
    let allowed = fees + u128::from(params.block_reward(block.height()));
    if u128::from(amount) > allowed {
        return Err(Rejection::ExcessiveCoinbase { amount, allowed });
    }

    Ok(())
}

/// Validate `head` and every ancestor down to genesis.
///
/// Heights must step down by exactly one and timestamps must not decrease
/// going forward. A walk that cannot reach genesis is rejected as having no
/// genesis block.
pub fn validate_chain(
    params: &ConsensusParams,
    chain: &Chain,
    ledger: &Ledger,
    head: &Block,
) -> Result<(), Rejection> {
    let mut current = head;
    loop {
        validate_block(params, chain, ledger, current)?;
        if current.header.is_genesis() {
            return Ok(());
        }

        let parent = chain.previous_of(current).map_err(|_| Rejection::NoGenesis)?;
        if parent.height().checked_add(1) != Some(current.height()) {
            return Err(Rejection::HeightDiscontinuity);
        }
        if current.timestamp() < parent.timestamp() {
            return Err(Rejection::TimestampRegression);
        }
        current = parent;
    }
}

/// Validate a transaction that has not been mined, against `head`'s UTXO
/// set with the rest of the mempool applied.
pub fn validate_pending_transaction(
    params: &ConsensusParams,
    chain: &Chain,
    ledger: &Ledger,
    head: &Block,
    pending: &[Transaction],
    tx: &Transaction,
) -> Result<(), Rejection> {
    let others: Vec<Transaction> = pending
        .iter()
        .filter(|other| other.hash != tx.hash)
        .cloned()
        .collect();
    let view = ledger
        .mempool_utxo_set(chain, head, &others)
        .map_err(|_| Rejection::NoGenesis)?;

    let result = validate_transaction(params, &view, tx);
    if let Err(rejection) = &result {
        debug!("Pending transaction {} rejected: {}", tx.hash, rejection);
    }
    result
}
