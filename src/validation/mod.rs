//! Validation of transactions, coinbases, blocks and chains
//!
//! Every check returns `Result<(), Rejection>`; `Rejection::code` maps a
//! failure onto the closed `ResultCode` taxonomy.

pub mod codes;
pub mod validator;

pub use codes::{Category, Rejection, ResultCode};
pub use validator::{
    validate_block, validate_chain, validate_coinbase, validate_pending_transaction,
    validate_transaction,
};
