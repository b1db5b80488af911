//! Wallet implementation
//!
//! A wallet is one key pair. Balances and spendable outputs are read from the
//! ledger as of a chosen head block.

use crate::core::{
    build_transaction, Block, Chain, ChainError, ConsensusParams, Ledger, Transaction,
    TransactionError,
};
use crate::crypto::{KeyError, KeyPair};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Chain error: {0}")]
    ChainError(#[from] ChainError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// Serializable wallet data for persistence
#[derive(Debug, Serialize, Deserialize)]
struct WalletData {
    secret_key_hex: String,
    address: String,
    label: Option<String>,
}

/// A single-key wallet
#[derive(Debug)]
pub struct Wallet {
    key_pair: KeyPair,
    /// Optional label for the wallet
    pub label: Option<String>,
}

impl Wallet {
    /// Create a new wallet with a fresh key pair
    pub fn new() -> Self {
        Self::from_key_pair(KeyPair::generate())
    }

    /// Create a wallet with a label
    pub fn with_label(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            ..Self::new()
        }
    }

    pub fn from_key_pair(key_pair: KeyPair) -> Self {
        Self {
            key_pair,
            label: None,
        }
    }

    /// Import a wallet from a hex secret key
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, WalletError> {
        Ok(Self::from_key_pair(KeyPair::from_secret_hex(secret_hex)?))
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// The wallet's address under `params`
    pub fn address(&self, params: &ConsensusParams) -> String {
        self.key_pair.address(params)
    }

    /// Get the wallet's public key (hex)
    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Get the wallet's secret key (hex)
    /// WARNING: Keep this secret!
    pub fn secret_key(&self) -> String {
        self.key_pair.secret_hex()
    }

    /// Confirmed balance as of `head`
    pub fn balance(
        &self,
        params: &ConsensusParams,
        chain: &Chain,
        ledger: &Ledger,
        head: &Block,
    ) -> Result<u64, WalletError> {
        Ok(ledger.balance(chain, head, &self.address(params))?)
    }

    /// Pay `amount` to `recipient`, leaving `fee` for the miner.
    ///
    /// Inputs are drawn from `head`'s UTXO set with `pending` applied, so
    /// change from unconfirmed payments can be spent again.
    #[allow(clippy::too_many_arguments)]
    pub fn create_transaction(
        &self,
        params: &ConsensusParams,
        chain: &Chain,
        ledger: &Ledger,
        head: &Block,
        pending: &[Transaction],
        recipient: &str,
        amount: u64,
        fee: u64,
    ) -> Result<Transaction, WalletError> {
        let address = self.address(params);
        let utxos = ledger.select_inputs(chain, head, pending, &address, amount.saturating_add(fee))?;
        let tx = build_transaction(params, &utxos, &self.key_pair, &address, recipient, amount, fee)?;

        info!(
            "Created transaction {} paying {} to {} (fee {})",
            tx.hash, amount, recipient, fee
        );
        Ok(tx)
    }

    /// Save wallet to file
    pub fn save(&self, params: &ConsensusParams, path: &Path) -> Result<(), WalletError> {
        let data = WalletData {
            secret_key_hex: self.secret_key(),
            address: self.address(params),
            label: self.label.clone(),
        };

        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load wallet from file
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path)?;
        let data: WalletData = serde_json::from_str(&json)?;

        let mut wallet = Self::from_secret_hex(&data.secret_key_hex)?;
        wallet.label = data.label;
        Ok(wallet)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::Miner;
    use crate::validation::validate_pending_transaction;

    fn funded(params: &ConsensusParams, wallet: &Wallet) -> (Chain, Ledger, Block) {
        let ledger = Ledger::new();
        let (genesis, _) = Miner::new(&wallet.address(params))
            .mine_block(params, &Chain::new(), &ledger, None, vec![])
            .unwrap();
        (Chain::from_blocks(vec![genesis.clone()]), ledger, genesis)
    }

    #[test]
    fn test_wallet_creation() {
        let params = ConsensusParams::default();
        let wallet = Wallet::new();
        assert!(!wallet.address(&params).is_empty());
        assert_eq!(wallet.public_key().len(), 66);
        assert_eq!(wallet.secret_key().len(), 64);
    }

    #[test]
    fn test_wallet_import() {
        let params = ConsensusParams::default();
        let wallet1 = Wallet::new();
        let wallet2 = Wallet::from_secret_hex(&wallet1.secret_key()).unwrap();
        assert_eq!(wallet1.address(&params), wallet2.address(&params));
        assert!(Wallet::from_secret_hex("zz").is_err());
    }

    #[test]
    fn test_wallet_save_load() {
        let params = ConsensusParams::default();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test_wallet.json");

        let wallet1 = Wallet::with_label("Test Wallet");
        wallet1.save(&params, &path).unwrap();

        let wallet2 = Wallet::load(&path).unwrap();
        assert_eq!(wallet1.address(&params), wallet2.address(&params));
        assert_eq!(wallet1.label, wallet2.label);
    }

    #[test]
    fn test_transaction_creation() {
        let params = ConsensusParams::default();
        let wallet = Wallet::new();
        let (chain, ledger, genesis) = funded(&params, &wallet);
        let reward = params.block_reward(0);

        assert_eq!(wallet.balance(&params, &chain, &ledger, &genesis).unwrap(), reward);

        let recipient = Wallet::new().address(&params);
        let tx = wallet
            .create_transaction(&params, &chain, &ledger, &genesis, &[], &recipient, 10, 2)
            .unwrap();

        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].amount, 10);
        assert_eq!(tx.outputs[1].amount, reward - 12);
        assert_eq!(
            validate_pending_transaction(&params, &chain, &ledger, &genesis, &[], &tx),
            Ok(())
        );
    }

    #[test]
    fn test_spend_unconfirmed_change() {
        let params = ConsensusParams::default();
        let wallet = Wallet::new();
        let (chain, ledger, genesis) = funded(&params, &wallet);
        let recipient = Wallet::new().address(&params);

        let first = wallet
            .create_transaction(&params, &chain, &ledger, &genesis, &[], &recipient, 10, 0)
            .unwrap();
        let second = wallet
            .create_transaction(&params, &chain, &ledger, &genesis, &[first.clone()], &recipient, 5, 0)
            .unwrap();

        assert_eq!(second.inputs[0].tx_hash, first.hash);
        assert_eq!(second.inputs[0].out_index, 1);
    }

    #[test]
    fn test_insufficient_funds() {
        let params = ConsensusParams::default();
        let wallet = Wallet::new();
        let (chain, ledger, genesis) = funded(&params, &wallet);

        let result = wallet.create_transaction(
            &params,
            &chain,
            &ledger,
            &genesis,
            &[],
            "anyone",
            params.block_reward(0),
            1,
        );
        assert!(matches!(
            result,
            Err(WalletError::TransactionError(TransactionError::InsufficientFunds { .. }))
        ));

        let broke = Wallet::new();
        let result = broke.create_transaction(&params, &chain, &ledger, &genesis, &[], "anyone", 1, 0);
        assert!(matches!(
            result,
            Err(WalletError::TransactionError(TransactionError::InsufficientFunds { have: 0, need: 1 }))
        ));
    }
}
