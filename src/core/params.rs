//! Consensus parameters
//!
//! One immutable value per network instance, passed by reference into every
//! operation. Fractional quantities (difficulty, retarget correction factors)
//! are fixed-point thousandths so no floating point enters consensus.

use crate::core::block::Difficulty;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Smallest units per coin
pub const COIN: u64 = 100_000_000;

/// Scale of all `*_milli` fixed-point values
pub const MILLI: u64 = 1_000;

/// Errors raised while loading or checking parameters
#[derive(Error, Debug)]
pub enum ParamsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid parameters: {0}")]
    Invalid(String),
}

/// Network-wide consensus rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    /// Human readable network name
    pub name: String,
    /// Schema version stamped into every block and transaction
    pub version: String,
    /// Leading byte of every address
    pub address_prefix: u8,
    /// Bytes of double SHA-256 appended to addresses
    pub checksum_len: usize,
    /// Reward of the genesis block, in smallest units
    pub initial_block_reward: u64,
    /// Heights between reward halvings
    pub halving_period: u64,
    /// Difficulty of the genesis block and floor for every retarget
    pub initial_difficulty: Difficulty,
    /// Hash target at difficulty 1; no block may use an easier target
    pub initial_hash_target: U256,
    /// Desired seconds between blocks
    pub target_block_time: u64,
    /// Heights between difficulty recalculations
    pub difficulty_recalc_period: u64,
    /// Lower clamp of the retarget correction factor (thousandths)
    pub min_correction_milli: u64,
    /// Upper clamp of the retarget correction factor (thousandths)
    pub max_correction_milli: u64,
}

/// `0x0fff…ff`: roughly one hash in sixteen meets it
fn default_initial_hash_target() -> U256 {
    let mut bytes = [0xffu8; 32];
    bytes[0] = 0x0f;
    U256::from_big_endian(&bytes)
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            name: "Bobcoin".to_string(),
            version: "1".to_string(),
            address_prefix: 0x06,
            checksum_len: 4,
            initial_block_reward: 50 * COIN,
            halving_period: 10,
            initial_difficulty: Difficulty::ONE,
            initial_hash_target: default_initial_hash_target(),
            target_block_time: 5 * 60,
            difficulty_recalc_period: 20,
            min_correction_milli: MILLI / 4,
            max_correction_milli: 4 * MILLI,
        }
    }
}

impl ConsensusParams {
    /// Load parameters from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self, ParamsError> {
        let json = fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&json)?;
        params.check()?;
        Ok(params)
    }

    /// Write parameters as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ParamsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject parameter combinations the engine cannot operate with
    pub fn check(&self) -> Result<(), ParamsError> {
        let invalid = |msg: &str| Err(ParamsError::Invalid(msg.to_string()));

        if self.version.is_empty() {
            return invalid("version must not be empty");
        }
        if self.checksum_len == 0 || self.checksum_len > 32 {
            return invalid("checksum_len must be between 1 and 32");
        }
        if self.halving_period == 0 {
            return invalid("halving_period must be positive");
        }
        if self.difficulty_recalc_period == 0 {
            return invalid("difficulty_recalc_period must be positive");
        }
        if self.initial_hash_target.is_zero() {
            return invalid("initial_hash_target must be positive");
        }
        if self.initial_difficulty.milli() == 0 {
            return invalid("initial_difficulty must be positive");
        }
        if self.min_correction_milli == 0 || self.min_correction_milli > self.max_correction_milli
        {
            return invalid("correction factors must satisfy 0 < min <= max");
        }
        Ok(())
    }

    /// Block reward at a height: the initial reward halved every
    /// `halving_period` blocks, truncated to whole smallest units
    pub fn block_reward(&self, height: u64) -> u64 {
        let halvings = height / self.halving_period.max(1);
        u32::try_from(halvings)
            .ok()
            .and_then(|n| self.initial_block_reward.checked_shr(n))
            .unwrap_or(0)
    }

    /// Expected milliseconds between two retarget points
    pub fn target_recalc_span_ms(&self) -> u64 {
        self.target_block_time
            .saturating_mul(1_000)
            .saturating_mul(self.difficulty_recalc_period)
            .saturating_mul(1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_consistent() {
        let params = ConsensusParams::default();
        assert!(params.check().is_ok());
        assert_eq!(params.target_recalc_span_ms(), 20 * 300 * 1000);
    }

    #[test]
    fn test_block_reward_halving() {
        let params = ConsensusParams::default();
        assert_eq!(params.block_reward(0), 50 * COIN);
        assert_eq!(params.block_reward(9), 50 * COIN);
        assert_eq!(params.block_reward(10), 25 * COIN);
        assert_eq!(params.block_reward(25), 1_250_000_000);
        assert_eq!(params.block_reward(10 * 64), 0);
        assert_eq!(params.block_reward(u64::MAX), 0);
    }

    #[test]
    fn test_block_reward_truncates() {
        let params = ConsensusParams {
            initial_block_reward: 5,
            halving_period: 1,
            ..ConsensusParams::default()
        };
        assert_eq!(params.block_reward(1), 2);
        assert_eq!(params.block_reward(2), 1);
        assert_eq!(params.block_reward(3), 0);
    }

    #[test]
    fn test_check_rejects_bad_values() {
        let bad = [
            ConsensusParams {
                halving_period: 0,
                ..ConsensusParams::default()
            },
            ConsensusParams {
                checksum_len: 40,
                ..ConsensusParams::default()
            },
            ConsensusParams {
                min_correction_milli: 5_000,
                ..ConsensusParams::default()
            },
            ConsensusParams {
                version: String::new(),
                ..ConsensusParams::default()
            },
        ];
        for params in bad {
            assert!(matches!(params.check(), Err(ParamsError::Invalid(_))));
        }
    }

    #[test]
    fn test_params_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");

        let params = ConsensusParams {
            name: "Testnet".to_string(),
            difficulty_recalc_period: 5,
            ..ConsensusParams::default()
        };
        params.save(&path).unwrap();

        let loaded = ConsensusParams::from_file(&path).unwrap();
        assert_eq!(loaded, params);
    }

    #[test]
    fn test_partial_params_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        fs::write(&path, r#"{ "name": "Tiny", "halving_period": 3 }"#).unwrap();

        let loaded = ConsensusParams::from_file(&path).unwrap();
        assert_eq!(loaded.name, "Tiny");
        assert_eq!(loaded.halving_period, 3);
        assert_eq!(loaded.initial_hash_target, ConsensusParams::default().initial_hash_target);
    }

    #[test]
    fn test_invalid_params_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        fs::write(&path, r#"{ "difficulty_recalc_period": 0 }"#).unwrap();
        assert!(matches!(
            ConsensusParams::from_file(&path),
            Err(ParamsError::Invalid(_))
        ));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ConsensusParams::from_file(&path),
            Err(ParamsError::SerializationError(_))
        ));
    }
}
