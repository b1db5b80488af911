//! Transaction handling
//!
//! Implements the UTXO transaction model: inputs reference earlier outputs and
//! carry the spender's public key and signature, outputs pay an address.
//!
//! Two digests matter:
//! - the **hash**, over timestamp, version and the JSON of the signed inputs
//!   and outputs with fields in declaration order; it identifies the
//!   transaction.
//! - the **pre-image**, the same digest with every signature replaced by the
//!   input's public key; it is what gets signed.

use crate::core::params::ConsensusParams;
use crate::core::utxo::Utxo;
use crate::crypto::{sha256_hex, KeyError, KeyPair};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction construction errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Input {tx_hash}:{out_index} is not owned by the sender")]
    ForeignInput { tx_hash: String, out_index: u32 },
    #[error("Signing key does not belong to sender address {0}")]
    SignerMismatch(String),
    #[error("Amount overflow")]
    AmountOverflow,
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// Current wall-clock time in Unix milliseconds
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// =============================================================================
// Transaction Input / Output
// =============================================================================

/// Transaction input (reference to previous output)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    /// Hash of the transaction holding the spent output
    pub tx_hash: String,
    /// Index of the output in that transaction
    pub out_index: u32,
    /// Compressed public key of the spender (hex)
    pub public_key: String,
    /// Signature over the pre-image; unset until signed
    pub signature: Option<String>,
}

impl TransactionInput {
    /// Unsigned input spending the given UTXO
    pub fn spending(utxo: &Utxo) -> Self {
        Self {
            tx_hash: utxo.tx_hash.clone(),
            out_index: utxo.out_index,
            public_key: String::new(),
            signature: None,
        }
    }

    /// Whether this input spends the given outpoint
    pub fn spends(&self, tx_hash: &str, out_index: u32) -> bool {
        self.tx_hash == tx_hash && self.out_index == out_index
    }

    fn digest_view<'a>(&'a self, signature: Option<&'a str>) -> InputDigest<'a> {
        InputDigest {
            tx_hash: &self.tx_hash,
            out_index: self.out_index,
            public_key: &self.public_key,
            signature,
        }
    }
}

/// An input as it enters a digest, with the signature slot substituted
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputDigest<'a> {
    tx_hash: &'a str,
    out_index: u32,
    public_key: &'a str,
    signature: Option<&'a str>,
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    /// Recipient's address
    pub address: String,
    /// Amount in smallest units
    pub amount: u64,
}

impl TransactionOutput {
    /// Check if this output belongs to the given address
    pub fn is_owned_by(&self, address: &str) -> bool {
        self.address == address
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// The two shapes a transaction can take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Zero inputs and exactly one output: mints reward plus fees
    Coinbase,
    /// Spends existing outputs
    Transfer,
}

/// A transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Creation time in Unix milliseconds
    pub timestamp: i64,
    /// Schema version
    pub version: String,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Transaction hash, computed last
    pub hash: String,
}

impl Transaction {
    /// Create a coinbase transaction paying `amount` to `address`
    pub fn coinbase(params: &ConsensusParams, address: &str, amount: u64, timestamp: i64) -> Self {
        let mut tx = Self {
            timestamp,
            version: params.version.clone(),
            inputs: Vec::new(),
            outputs: vec![TransactionOutput {
                address: address.to_string(),
                amount,
            }],
            hash: String::new(),
        };
        tx.hash = tx.calculate_hash();
        tx
    }

    /// Classify the transaction by shape
    pub fn kind(&self) -> TransactionKind {
        if self.inputs.is_empty() && self.outputs.len() == 1 {
            TransactionKind::Coinbase
        } else {
            TransactionKind::Transfer
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.kind() == TransactionKind::Coinbase
    }

    fn digest(&self, signature_of: impl Fn(&TransactionInput) -> Option<&str>) -> String {
        let inputs: Vec<InputDigest> = self
            .inputs
            .iter()
            .map(|input| input.digest_view(signature_of(input)))
            .collect();

        // Plain structs with string keys always serialize
        let data = format!(
            "{}{}{}{}",
            self.timestamp,
            self.version,
            serde_json::to_string(&inputs).unwrap_or_default(),
            serde_json::to_string(&self.outputs).unwrap_or_default()
        );
        sha256_hex(data.as_bytes())
    }

    /// Calculate the transaction hash over the signed inputs
    pub fn calculate_hash(&self) -> String {
        self.digest(|input| input.signature.as_deref())
    }

    /// Canonical unsigned form: every signature replaced by its public key
    pub fn preimage(&self) -> String {
        self.digest(|input| Some(input.public_key.as_str()))
    }

    /// Sign every input with one key pair and recompute the hash.
    ///
    /// Only single-signer transactions exist; each input receives the same
    /// public key and the same signature.
    pub fn sign(&mut self, key_pair: &KeyPair) -> Result<(), TransactionError> {
        let public_key_hex = key_pair.public_key_hex();
        for input in &mut self.inputs {
            input.public_key = public_key_hex.clone();
        }

        let signature = key_pair.sign(&self.preimage())?;
        for input in &mut self.inputs {
            input.signature = Some(signature.clone());
        }

        self.hash = self.calculate_hash();
        Ok(())
    }

    /// Get total output amount, `None` on overflow
    pub fn total_output(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, output| acc.checked_add(output.amount))
    }

    /// Public key shared by every input, or `None` if inputs disagree or
    /// there are none
    pub fn sole_signer(&self) -> Option<&str> {
        let first = self.inputs.first()?.public_key.as_str();
        self.inputs
            .iter()
            .all(|input| input.public_key == first)
            .then_some(first)
    }
}

// =============================================================================
// Transaction Builder
// =============================================================================

/// Builder for assembling and signing a transfer
pub struct TransactionBuilder {
    version: String,
    timestamp: i64,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
}

impl TransactionBuilder {
    pub fn new(params: &ConsensusParams) -> Self {
        Self {
            version: params.version.clone(),
            timestamp: unix_millis(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Add an input from a UTXO
    pub fn add_input(mut self, utxo: &Utxo) -> Self {
        self.inputs.push(TransactionInput::spending(utxo));
        self
    }

    /// Add an output
    pub fn add_output(mut self, address: &str, amount: u64) -> Self {
        self.outputs.push(TransactionOutput {
            address: address.to_string(),
            amount,
        });
        self
    }

    /// Override the creation time
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build and sign the transaction
    pub fn build_and_sign(self, key_pair: &KeyPair) -> Result<Transaction, TransactionError> {
        let mut tx = self.build();
        tx.sign(key_pair)?;
        Ok(tx)
    }

    /// Build without signing
    pub fn build(self) -> Transaction {
        let mut tx = Transaction {
            timestamp: self.timestamp,
            version: self.version,
            inputs: self.inputs,
            outputs: self.outputs,
            hash: String::new(),
        };
        tx.hash = tx.calculate_hash();
        tx
    }
}

/// Build and sign a payment from previously selected UTXOs.
///
/// One output pays `amount` to `recipient`; a second returns any change above
/// `amount + fee` to `sender_address`. Every selected UTXO must belong to the
/// sender and together they must cover `amount + fee`.
pub fn build_transaction(
    params: &ConsensusParams,
    utxos: &[Utxo],
    signer: &KeyPair,
    sender_address: &str,
    recipient: &str,
    amount: u64,
    fee: u64,
) -> Result<Transaction, TransactionError> {
    if signer.address(params) != sender_address {
        return Err(TransactionError::SignerMismatch(sender_address.to_string()));
    }

    if let Some(foreign) = utxos.iter().find(|utxo| utxo.address != sender_address) {
        return Err(TransactionError::ForeignInput {
            tx_hash: foreign.tx_hash.clone(),
            out_index: foreign.out_index,
        });
    }

    let have = utxos
        .iter()
        .try_fold(0u64, |acc, utxo| acc.checked_add(utxo.amount))
        .ok_or(TransactionError::AmountOverflow)?;
    let need = amount
        .checked_add(fee)
        .ok_or(TransactionError::AmountOverflow)?;
    if utxos.is_empty() || have < need {
        return Err(TransactionError::InsufficientFunds { have, need });
    }

    let mut builder = utxos
        .iter()
        .fold(TransactionBuilder::new(params), |builder, utxo| {
            builder.add_input(utxo)
        })
        .add_output(recipient, amount);

    let change = have - need;
    if change > 0 {
        builder = builder.add_output(sender_address, change);
    }

    builder.build_and_sign(signer)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::verify_digest;

    fn utxo_for(address: &str, amount: u64) -> Utxo {
        Utxo {
            tx_hash: sha256_hex(address.as_bytes()),
            out_index: 0,
            address: address.to_string(),
            amount,
        }
    }

    #[test]
    fn test_coinbase_transaction() {
        let params = ConsensusParams::default();
        let tx = Transaction::coinbase(&params, "miner", 50, 1);
        assert_eq!(tx.kind(), TransactionKind::Coinbase);
        assert_eq!(tx.total_output(), Some(50));
        assert_eq!(tx.hash, tx.calculate_hash());
        assert_eq!(tx.version, params.version);
    }

    #[test]
    fn test_transaction_hash_depends_on_outputs() {
        let params = ConsensusParams::default();
        let tx1 = Transaction::coinbase(&params, "addr1", 50, 1);
        let tx2 = Transaction::coinbase(&params, "addr2", 50, 1);
        let tx3 = Transaction::coinbase(&params, "addr1", 51, 1);
        assert_ne!(tx1.hash, tx2.hash);
        assert_ne!(tx1.hash, tx3.hash);
    }

    #[test]
    fn test_transaction_signing() {
        let params = ConsensusParams::default();
        let key_pair = KeyPair::generate();
        let sender = key_pair.address(&params);

        let tx = TransactionBuilder::new(&params)
            .add_input(&utxo_for(&sender, 100))
            .add_output("recipient", 50)
            .build_and_sign(&key_pair)
            .unwrap();

        let input = &tx.inputs[0];
        assert_eq!(input.public_key, key_pair.public_key_hex());
        let signature = input.signature.as_deref().unwrap();
        assert!(verify_digest(&input.public_key, &tx.preimage(), signature));
        assert_eq!(tx.hash, tx.calculate_hash());
        assert_eq!(tx.kind(), TransactionKind::Transfer);
    }

    #[test]
    fn test_preimage_ignores_signatures() {
        let params = ConsensusParams::default();
        let key_pair = KeyPair::generate();
        let sender = key_pair.address(&params);

        let mut tx = TransactionBuilder::new(&params)
            .add_input(&utxo_for(&sender, 100))
            .add_output("recipient", 50)
            .build_and_sign(&key_pair)
            .unwrap();

        let preimage = tx.preimage();
        let hash = tx.hash.clone();
        tx.inputs[0].signature = Some("00".repeat(64));
        assert_eq!(tx.preimage(), preimage);
        assert_ne!(tx.calculate_hash(), hash);
    }

    #[test]
    fn test_sole_signer() {
        let params = ConsensusParams::default();
        let key_pair = KeyPair::generate();
        let sender = key_pair.address(&params);

        let mut tx = TransactionBuilder::new(&params)
            .add_input(&utxo_for(&sender, 10))
            .add_input(&utxo_for("other", 10))
            .add_output("recipient", 20)
            .build_and_sign(&key_pair)
            .unwrap();
        assert_eq!(tx.sole_signer(), Some(key_pair.public_key_hex().as_str()));

        tx.inputs[1].public_key = KeyPair::generate().public_key_hex();
        assert_eq!(tx.sole_signer(), None);
    }

    #[test]
    fn test_build_transaction_with_change() {
        let params = ConsensusParams::default();
        let key_pair = KeyPair::generate();
        let sender = key_pair.address(&params);
        let utxos = vec![utxo_for(&sender, 60), utxo_for(&sender, 40)];

        let tx = build_transaction(&params, &utxos, &key_pair, &sender, "bob", 70, 5).unwrap();

        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0], TransactionOutput { address: "bob".into(), amount: 70 });
        assert_eq!(tx.outputs[1], TransactionOutput { address: sender.clone(), amount: 25 });
        assert!(tx.inputs.iter().all(|i| i.signature == tx.inputs[0].signature));
    }

    #[test]
    fn test_build_transaction_exact_amount_has_no_change() {
        let params = ConsensusParams::default();
        let key_pair = KeyPair::generate();
        let sender = key_pair.address(&params);
        let utxos = vec![utxo_for(&sender, 75)];

        let tx = build_transaction(&params, &utxos, &key_pair, &sender, "bob", 70, 5).unwrap();
        assert_eq!(tx.outputs.len(), 1);
    }

    #[test]
    fn test_build_transaction_rejects_insufficient_funds() {
        let params = ConsensusParams::default();
        let key_pair = KeyPair::generate();
        let sender = key_pair.address(&params);
        let utxos = vec![utxo_for(&sender, 10)];

        let err = build_transaction(&params, &utxos, &key_pair, &sender, "bob", 10, 1).unwrap_err();
        assert!(matches!(err, TransactionError::InsufficientFunds { have: 10, need: 11 }));

        let err = build_transaction(&params, &[], &key_pair, &sender, "bob", 0, 0).unwrap_err();
        assert!(matches!(err, TransactionError::InsufficientFunds { have: 0, .. }));
    }

    #[test]
    fn test_build_transaction_rejects_foreign_inputs() {
        let params = ConsensusParams::default();
        let key_pair = KeyPair::generate();
        let sender = key_pair.address(&params);
        let utxos = vec![utxo_for(&sender, 10), utxo_for("someone-else", 10)];

        let err = build_transaction(&params, &utxos, &key_pair, &sender, "bob", 5, 0).unwrap_err();
        assert!(matches!(err, TransactionError::ForeignInput { .. }));

        let stranger = KeyPair::generate();
        let err =
            build_transaction(&params, &utxos[..1], &stranger, &sender, "bob", 5, 0).unwrap_err();
        assert!(matches!(err, TransactionError::SignerMismatch(_)));
    }

    #[test]
    fn test_digest_keeps_field_order() {
        let tx = Transaction {
            timestamp: 7,
            version: "1".to_string(),
            inputs: vec![TransactionInput {
                tx_hash: "aa".to_string(),
                out_index: 1,
                public_key: "pk".to_string(),
                signature: Some("sig".to_string()),
            }],
            outputs: vec![TransactionOutput {
                address: "addr".to_string(),
                amount: 5,
            }],
            hash: String::new(),
        };

        assert_eq!(
            tx.calculate_hash(),
            sha256_hex(
                br#"71[{"txHash":"aa","outIndex":1,"publicKey":"pk","signature":"sig"}][{"address":"addr","amount":5}]"#
            )
        );
        assert_eq!(
            tx.preimage(),
            sha256_hex(
                br#"71[{"txHash":"aa","outIndex":1,"publicKey":"pk","signature":"pk"}][{"address":"addr","amount":5}]"#
            )
        );
    }

    #[test]
    fn test_transaction_json_shape() {
        let params = ConsensusParams::default();
        let tx = Transaction::coinbase(&params, "miner", 50, 1);
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["outputs"][0]["address"], "miner");
        assert!(value["inputs"].as_array().unwrap().is_empty());

        let decoded: Transaction = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, tx);
    }
}
