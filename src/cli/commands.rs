//! CLI commands
//!
//! Implements the command handlers for the CLI interface.

use crate::core::{Block, Chain, ConsensusParams, Ledger, Transaction, COIN};
use crate::mining::Miner;
use crate::validation::{validate_chain, ResultCode};
use crate::wallet::Wallet;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Render base units as whole coins
pub fn format_amount(amount: u64) -> String {
    format!("{}.{:08}", amount / COIN, amount % COIN)
}

/// First 16 characters of a hash, or all of it when shorter
fn short_hash(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

/// In-memory node state: the block index, its ledger caches and the
/// transactions waiting to be mined
pub struct AppState {
    pub params: ConsensusParams,
    pub chain: Chain,
    pub ledger: Ledger,
    pub pending: Vec<Transaction>,
}

impl AppState {
    pub fn new(params: ConsensusParams) -> Self {
        Self {
            params,
            chain: Chain::new(),
            ledger: Ledger::new(),
            pending: Vec::new(),
        }
    }

    /// Load parameters from `path`, or use the defaults
    pub fn load_params(path: Option<&PathBuf>) -> CliResult<ConsensusParams> {
        let params = match path {
            Some(path) => ConsensusParams::from_file(path)?,
            None => ConsensusParams::default(),
        };
        params.check()?;
        Ok(params)
    }

    pub fn best_block(&self) -> Option<&Block> {
        self.chain.best_block(&self.params, &self.ledger)
    }

    /// Mine the mempool on top of the best block and index the result
    pub fn mine(&mut self, miner_address: &str) -> CliResult<Block> {
        let head = self.best_block().cloned();
        let transactions = match &head {
            Some(head) => self.ledger.mempool(&self.chain, head, &self.pending)?,
            None => Vec::new(),
        };

        let miner = Miner::new(miner_address);
        let (block, stats) = miner.mine_block(
            &self.params,
            &self.chain,
            &self.ledger,
            head.as_ref(),
            transactions,
        )?;

        println!("\n   Block {} mined!", block.height());
        println!("   ├─ Hash: {}", short_hash(&block.hash));
        println!("   ├─ Transactions: {}", block.tx_count());
        println!("   ├─ Difficulty: {}", block.difficulty());
        println!("   ├─ Time: {}ms", stats.time_ms);
        println!("   ├─ Attempts: {}", stats.hash_attempts);
        println!("   └─ Hash rate: {:.2} H/s", stats.hash_rate);

        self.chain.insert(block.clone());
        let confirmed = self.ledger.confirmed_transactions(&self.chain, &block)?;
        let confirmed: HashSet<&str> = confirmed.iter().map(|tx| tx.hash.as_str()).collect();
        self.pending.retain(|tx| !confirmed.contains(tx.hash.as_str()));

        Ok(block)
    }
}

/// Print the effective consensus parameters
pub fn cmd_params(params: &ConsensusParams) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(params)?);
    Ok(())
}

/// Generate a key pair, optionally saving it as a wallet file
pub fn cmd_keygen(params: &ConsensusParams, out: Option<&Path>) -> CliResult<()> {
    let wallet = Wallet::new();

    println!("🔐 New key pair");
    println!("   📍 Address: {}", wallet.address(params));
    println!("   🔑 Public Key: {}", wallet.public_key());

    match out {
        Some(path) => {
            wallet.save(params, path)?;
            println!("   💾 Saved to {:?}", path);
        }
        None => {
            println!("   🗝️  Secret Key: {}", wallet.secret_key());
            println!("\n   ⚠️  IMPORTANT: Keep the secret key safe!");
        }
    }

    Ok(())
}

/// Mine a genesis block and `blocks` more, sending a payment in each
pub fn cmd_demo(params: ConsensusParams, blocks: u32, out: Option<&Path>) -> CliResult<()> {
    let mut state = AppState::new(params);
    let alice = Wallet::with_label("alice");
    let bob = Wallet::with_label("bob");
    let miner = Wallet::with_label("miner");
    let (alice_address, bob_address, miner_address) = (
        alice.address(&state.params),
        bob.address(&state.params),
        miner.address(&state.params),
    );

    println!("⛏️  Mining genesis for alice ({})", alice_address);
    let genesis = state.mine(&alice_address)?;

    for round in 0..blocks {
        let head = state.best_block().cloned().ok_or("no valid best block")?;
        let amount = COIN / 2;
        let fee = COIN / 100;

        match alice.create_transaction(
            &state.params,
            &state.chain,
            &state.ledger,
            &head,
            &state.pending,
            &bob_address,
            amount,
            fee,
        ) {
            Ok(tx) => {
                println!(
                    "\n📤 Round {}: alice sends {} to bob ({})",
                    round + 1,
                    format_amount(amount),
                    short_hash(&tx.hash)
                );
                state.pending.push(tx);
            }
            Err(e) => println!("\n❌ Round {}: alice cannot pay bob: {}", round + 1, e),
        }

        state.mine(&miner_address)?;
    }

    let best = state.best_block().cloned().ok_or("no valid best block")?;
    println!("\n⛓️  Best block");
    println!("   ├─ Height: {}", best.height());
    println!("   ├─ Hash: {}", best.hash);
    println!(
        "   └─ Genesis confirmations: {}",
        state.chain.confirmations(&state.params, &state.ledger, &genesis)
    );

    println!("\n💰 Balances");
    for wallet in [&alice, &bob, &miner] {
        let balance = wallet.balance(&state.params, &state.chain, &state.ledger, &best)?;
        println!(
            "   {} ({}) - {} coins",
            wallet.label.as_deref().unwrap_or("-"),
            wallet.address(&state.params),
            format_amount(balance)
        );
    }

    if let Some(path) = out {
        let json = serde_json::to_string_pretty(&state.chain)?;
        fs::write(path, json)?;
        println!("\n📦 Chain exported to {:?}", path);
    }

    Ok(())
}

/// Validate every branch head of a chain file and report the best block
pub fn cmd_validate(params: &ConsensusParams, path: &Path) -> CliResult<()> {
    let json = fs::read_to_string(path)?;
    let chain: Chain = serde_json::from_str(&json)?;
    let chain = Chain::from_blocks(chain.iter().cloned().collect());
    let ledger = Ledger::new();

    println!("🔍 Validating {} block(s) from {:?}...", chain.len(), path);

    let parents: HashSet<&str> = chain.iter().filter_map(Block::previous_hash).collect();
    for head in chain.iter().filter(|block| !parents.contains(block.hash.as_str())) {
        let result = validate_chain(params, &chain, &ledger, head);
        let code = ResultCode::of(&result);
        match result {
            Ok(()) => println!("   ✅ #{} {} {}", head.height(), short_hash(&head.hash), code),
            Err(rejection) => println!(
                "   ❌ #{} {} {}: {}",
                head.height(),
                short_hash(&head.hash),
                code,
                rejection
            ),
        }
    }

    match chain.best_block(params, &ledger) {
        Some(best) => println!("\n⛓️  Best block: #{} {}", best.height(), best.hash),
        None => println!("\n❌ No valid chain found"),
    }

    Ok(())
}
