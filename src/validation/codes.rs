//! Result codes
//!
//! Every consensus rejection maps to exactly one code from a closed set,
//! grouped by what was malformed: the block, a transaction, the coinbase or
//! the chain linking blocks together.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a block, transaction or chain was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("invalid height")]
    InvalidHeight,
    #[error("no version or timestamp")]
    MissingBlockMetadata,
    #[error("no transactions")]
    NoTransactions,
    #[error("invalid hash")]
    InvalidBlockHash,
    #[error("invalid difficulty: expected {expected}, found {found}")]
    InvalidDifficulty { expected: String, found: String },
    #[error("hash not within target of {target}")]
    HashAboveTarget { target: String },
    #[error("invalid merkle root")]
    InvalidMerkleRoot,

    #[error("invalid inputs or outputs lengths")]
    InvalidLengths,
    #[error("invalid hash")]
    InvalidTransactionHash,
    #[error("no version or timestamp")]
    MissingTransactionMetadata,
    #[error("input {tx_hash}:{out_index} does not exist as a UTXO")]
    MissingUtxo { tx_hash: String, out_index: u32 },
    #[error("input has invalid public key")]
    InputKeyMismatch,
    #[error("output address invalid")]
    InvalidOutputAddress,
    #[error("input is {input} and output is {output}")]
    Overspend { input: u128, output: u128 },
    #[error("more than one sender")]
    MultipleSenders,
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid hash")]
    InvalidCoinbaseHash,
    #[error("no version or timestamp")]
    MissingCoinbaseMetadata,
    #[error("invalid input length")]
    CoinbaseHasInputs,
    #[error("invalid output length")]
    CoinbaseOutputCount,
    #[error("invalid miner address")]
    InvalidMinerAddress,
    #[error("coinbase amt of {amount} larger than actual {allowed}")]
    ExcessiveCoinbase { amount: u64, allowed: u128 },

    #[error("invalid height w.r.t. previous block")]
    HeightDiscontinuity,
    #[error("invalid timestamp w.r.t. previous block")]
    TimestampRegression,
    #[error("no genesis block")]
    NoGenesis,
}

impl Rejection {
    pub fn code(&self) -> ResultCode {
        use Rejection::*;
        match self {
            InvalidHeight => ResultCode::BK00,
            MissingBlockMetadata => ResultCode::BK01,
            NoTransactions => ResultCode::BK02,
            InvalidBlockHash => ResultCode::BK03,
            InvalidDifficulty { .. } => ResultCode::BK04,
            HashAboveTarget { .. } => ResultCode::BK05,
            InvalidMerkleRoot => ResultCode::BK06,
            InvalidLengths => ResultCode::TX00,
            InvalidTransactionHash => ResultCode::TX01,
            MissingTransactionMetadata => ResultCode::TX02,
            MissingUtxo { .. } => ResultCode::TX03,
            InputKeyMismatch => ResultCode::TX04,
            InvalidOutputAddress => ResultCode::TX05,
            Overspend { .. } => ResultCode::TX06,
            MultipleSenders => ResultCode::TX07,
            InvalidSignature => ResultCode::TX08,
            InvalidCoinbaseHash => ResultCode::CB00,
            MissingCoinbaseMetadata => ResultCode::CB01,
            CoinbaseHasInputs => ResultCode::CB02,
            CoinbaseOutputCount => ResultCode::CB03,
            InvalidMinerAddress => ResultCode::CB04,
            ExcessiveCoinbase { .. } => ResultCode::CB05,
            HeightDiscontinuity => ResultCode::BC00,
            TimestampRegression => ResultCode::BC01,
            NoGenesis => ResultCode::BC02,
        }
    }

    pub fn category(&self) -> Category {
        self.code().category()
    }
}

/// What part of the data a code refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Block,
    Transaction,
    Coinbase,
    Chain,
    Valid,
}

/// Validation outcome codes
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    BK00,
    BK01,
    BK02,
    BK03,
    BK04,
    BK05,
    BK06,
    TX00,
    TX01,
    TX02,
    TX03,
    TX04,
    TX05,
    TX06,
    TX07,
    TX08,
    CB00,
    CB01,
    CB02,
    CB03,
    CB04,
    CB05,
    BC00,
    BC01,
    BC02,
    VALID,
}

impl ResultCode {
    /// Code of a validation result
    pub fn of(result: &Result<(), Rejection>) -> Self {
        match result {
            Ok(()) => ResultCode::VALID,
            Err(rejection) => rejection.code(),
        }
    }

    pub fn category(self) -> Category {
        use ResultCode::*;
        match self {
            BK00 | BK01 | BK02 | BK03 | BK04 | BK05 | BK06 => Category::Block,
            TX00 | TX01 | TX02 | TX03 | TX04 | TX05 | TX06 | TX07 | TX08 => Category::Transaction,
            CB00 | CB01 | CB02 | CB03 | CB04 | CB05 => Category::Coinbase,
            BC00 | BC01 | BC02 => Category::Chain,
            VALID => Category::Valid,
        }
    }

    /// Stable numeric identifier used on the wire
    pub fn value(self) -> u8 {
        use ResultCode::*;
        match self {
            BK00 => 0,
            BK01 => 1,
            BK02 => 2,
            BK03 => 3,
            BK04 => 4,
            BK05 => 5,
            TX00 => 6,
            TX01 => 7,
            TX02 => 8,
            TX03 => 9,
            TX04 => 10,
            TX05 => 11,
            TX06 => 12,
            TX07 => 13,
            TX08 => 14,
            CB00 => 15,
            CB01 => 16,
            CB02 => 17,
            CB03 => 18,
            CB04 => 19,
            CB05 => 20,
            BC00 => 21,
            BC01 => 22,
            BC02 => 23,
            VALID => 24,
            BK06 => 25,
        }
    }

    pub fn is_valid(self) -> bool {
        self == ResultCode::VALID
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_categories() {
        assert_eq!(Rejection::InvalidMerkleRoot.code(), ResultCode::BK06);
        assert_eq!(Rejection::InvalidMerkleRoot.category(), Category::Block);
        assert_eq!(
            Rejection::MissingUtxo {
                tx_hash: "ab".into(),
                out_index: 1
            }
            .category(),
            Category::Transaction
        );
        assert_eq!(Rejection::CoinbaseHasInputs.category(), Category::Coinbase);
        assert_eq!(Rejection::NoGenesis.category(), Category::Chain);
        assert_eq!(ResultCode::VALID.category(), Category::Valid);
    }

    #[test]
    fn test_of_result() {
        assert_eq!(ResultCode::of(&Ok(())), ResultCode::VALID);
        assert!(ResultCode::of(&Ok(())).is_valid());
        assert_eq!(
            ResultCode::of(&Err(Rejection::InvalidSignature)),
            ResultCode::TX08
        );
    }

    #[test]
    fn test_display_and_messages() {
        assert_eq!(ResultCode::CB05.to_string(), "CB05");
        assert_eq!(ResultCode::VALID.to_string(), "VALID");
        assert_eq!(
            Rejection::Overspend {
                input: 5,
                output: 7
            }
            .to_string(),
            "input is 5 and output is 7"
        );
        assert_eq!(
            Rejection::MissingUtxo {
                tx_hash: "ff".into(),
                out_index: 2
            }
            .to_string(),
            "input ff:2 does not exist as a UTXO"
        );
    }

    #[test]
    fn test_numeric_values_are_distinct() {
        use ResultCode::*;
        let all = [
            BK00, BK01, BK02, BK03, BK04, BK05, BK06, TX00, TX01, TX02, TX03, TX04, TX05, TX06,
            TX07, TX08, CB00, CB01, CB02, CB03, CB04, CB05, BC00, BC01, BC02, VALID,
        ];
        let mut values: Vec<u8> = all.iter().map(|code| code.value()).collect();
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), all.len());
        assert_eq!(BK06.value(), 25);
    }
}
