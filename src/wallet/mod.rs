//! Key storage for ledger addresses

pub mod wallet;

pub use wallet::{FileKeyStore, KeyStore, Wallet, Wallets};
