use crate::config::Config;
use crate::core::{Ledger, Transaction};
use crate::crypto::keys::Address;
use crate::wallet::{FileKeyStore, KeyStore};
use crate::{LedgerError, Result};
use clap::{Parser, Subcommand};
use console::{style, Emoji};

static CHAIN: Emoji<'_, '_> = Emoji("⛓️  ", "");
static MONEY: Emoji<'_, '_> = Emoji("💰 ", "");
static KEY: Emoji<'_, '_> = Emoji("🔑 ", "");
static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "");
static CROSS: Emoji<'_, '_> = Emoji("❌ ", "");

#[derive(Parser, Debug)]
#[command(name = "ledgerd")]
#[command(about = "Single-node UTXO ledger with proof-of-work blocks")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Ledger data directory")]
    pub data_dir: Option<String>,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<String>,

    #[arg(long, help = "Number of mining threads")]
    pub threads: Option<usize>,

    #[arg(long, help = "Enable debug logging")]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Get the balance of an address
    #[command(name = "getbalance")]
    GetBalance {
        #[arg(long)]
        address: String,
    },

    /// Create a ledger and send the genesis reward to an address
    #[command(name = "createblockchain")]
    CreateBlockchain {
        #[arg(long)]
        address: String,
    },

    /// Send coins from one address to another
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        amount: u64,
    },

    /// Print every block from tip to genesis
    #[command(name = "printchain")]
    PrintChain,

    /// Generate a new key pair and store it in the wallet file
    #[command(name = "createwallet")]
    CreateWallet,

    /// List the addresses in the wallet file
    #[command(name = "listaddresses")]
    ListAddresses,
}

pub fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).try_init();
}

pub fn run_cli(cli: Cli, config: Config) -> Result<()> {
    init_logging(cli.debug);

    let mut config = config;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir.into();
    }
    if let Some(threads) = cli.threads {
        config.mining.threads = threads;
    }

    match cli.command {
        Commands::GetBalance { address } => {
            let address = parse_address(&address)?;
            let balance = get_balance(&config, &address)?;
            println!("{}Balance of {}: {}", MONEY, style(&address).bold().cyan(), style(balance).bold());
            Ok(())
        }

        Commands::CreateBlockchain { address } => {
            let address = parse_address(&address)?;
            let ledger = create_blockchain(&config, &address)?;
            println!("{}Genesis block: {}", CHAIN, style(ledger.tip()).bold());
            println!("{}Finished!", CHECK);
            Ok(())
        }

        Commands::Send { from, to, amount } => {
            let from = parse_address(&from)?;
            let to = parse_address(&to)?;
            match send(&config, &from, &to, amount) {
                Ok(tx) => {
                    println!("{}Sent {} from {} to {}", CHECK, style(amount).bold(), from, to);
                    println!("Transaction: {}", style(tx.id).dim());
                    Ok(())
                }
                Err(e) => {
                    println!("{}{}", CROSS, style(&e).red());
                    Err(e)
                }
            }
        }

        Commands::PrintChain => print_chain(&config),

        Commands::CreateWallet => {
            let address = FileKeyStore::new(&config.storage.wallet_file).create_wallet()?;
            println!("{}New address: {}", KEY, style(&address).bold().green());
            Ok(())
        }

        Commands::ListAddresses => {
            let wallets = FileKeyStore::new(&config.storage.wallet_file).load()?;
            if wallets.is_empty() {
                println!("No wallets yet. Use 'ledgerd createwallet' to create one.");
            }
            for address in wallets.addresses() {
                println!("{}", address);
            }
            Ok(())
        }
    }
}

fn parse_address(address: &str) -> Result<Address> {
    address.parse()
}

pub fn create_blockchain(config: &Config, address: &Address) -> Result<Ledger> {
    println!("{}Mining genesis block...", SPARKLE);
    Ledger::init_genesis(
        &config.storage.data_dir,
        address,
        &config.genesis.memo,
        &config.mining,
    )
}

pub fn get_balance(config: &Config, address: &Address) -> Result<u64> {
    let ledger = Ledger::open(&config.storage.data_dir, &config.mining)?;
    ledger.utxo().balance(&address.locking_hash()?)
}

/// Builds, signs and appends a transfer paid with `from`'s stored key.
pub fn send(config: &Config, from: &Address, to: &Address, amount: u64) -> Result<Transaction> {
    let wallets = FileKeyStore::new(&config.storage.wallet_file).load()?;
    let keypair = wallets
        .get_wallet(from)
        .ok_or_else(|| LedgerError::Wallet(format!("No key for {} in wallet file", from)))?
        .keypair()?;

    let mut ledger = Ledger::open(&config.storage.data_dir, &config.mining)?;
    let mut tx = Transaction::new_transfer(&keypair.locking_hash(), to, amount, &ledger.utxo())?;
    ledger.sign_transaction(&mut tx, &keypair.private_key)?;
    ledger.append_block(vec![tx.clone()])?;

    Ok(tx)
}

fn print_chain(config: &Config) -> Result<()> {
    let ledger = Ledger::open(&config.storage.data_dir, &config.mining)?;
    let pow = ledger.proof_of_work();

    for block in ledger.iter() {
        let block = block?;

        println!("{}Block {}", CHAIN, style(block.hash).bold());
        match block.prev_hash {
            Some(prev_hash) => println!("Prev. hash: {}", prev_hash),
            None => println!("Prev. hash: {}", style("(genesis)").dim()),
        }
        println!("Nonce: {}", block.nonce);

        let valid = pow.validate(&block);
        let pow_label = if valid { style("true").green() } else { style("false").red() };
        println!("PoW: {}", pow_label);

        for tx in &block.transactions {
            println!("{}", tx);
        }
        println!();
    }

    Ok(())
}
