//! Command-line front end

pub mod commands;

pub use commands::{cmd_demo, cmd_keygen, cmd_params, cmd_validate, format_amount, AppState, CliResult};
