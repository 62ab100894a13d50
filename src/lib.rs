//! UTXO Ledger - a single-node, append-only block ledger
//!
//! This library implements:
//! - Hash-linked blocks persisted in sled, keyed by block hash with an `lh` tip pointer
//! - Fixed-difficulty SHA-256 proof-of-work
//! - A by-address unspent-output view derived from a full chain scan
//! - secp256k1-signed transfers with per-input trimmed-copy signing digests
//! - A file-backed key store and the command line surface over all of the above

pub mod core;
pub mod crypto;
pub mod wallet;
pub mod mining;
pub mod storage;
pub mod consensus;
pub mod cli;
pub mod error;
pub mod config;

pub use error::{LedgerError, Result};
