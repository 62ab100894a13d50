//! Command line interface for the ledger

pub mod commands;

pub use commands::{run_cli, Cli, Commands};
