use clap::Parser;
use std::path::Path;
use utxo_ledger::cli::{run_cli, Cli};
use utxo_ledger::config::Config;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load_from(Path::new(path))?,
        None => Config::load()?,
    };

    // Run CLI (logging will be initialized there based on debug flag)
    run_cli(cli, config)?;

    Ok(())
}
