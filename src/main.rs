//! Bobcoin CLI Application
//!
//! A command-line interface for exercising the consensus engine.

use bobcoin::cli::{self, AppState, CliResult};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bobcoin")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A minimal proof-of-work cryptocurrency consensus engine", long_about = None)]
struct Cli {
    /// Consensus parameters as JSON (defaults to the Bobcoin network)
    #[arg(short, long, global = true)]
    params: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective consensus parameters
    Params,

    /// Generate a new key pair
    Keygen {
        /// Save the key pair as a wallet file instead of printing the secret
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Mine a genesis block plus N blocks carrying payments
    Demo {
        /// Number of blocks to mine after genesis
        #[arg(short, long, default_value = "3")]
        blocks: u32,

        /// Write the resulting chain as JSON
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Validate a chain file
    Validate {
        /// Chain JSON (a list of blocks)
        #[arg(short, long)]
        chain: PathBuf,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let params = AppState::load_params(cli.params.as_ref())?;

    match cli.command {
        Commands::Params => cli::cmd_params(&params)?,
        Commands::Keygen { out } => cli::cmd_keygen(&params, out.as_deref())?,
        Commands::Demo { blocks, out } => cli::cmd_demo(params, blocks, out.as_deref())?,
        Commands::Validate { chain } => cli::cmd_validate(&params, &chain)?,
    }

    Ok(())
}
