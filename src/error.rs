use crate::crypto::hash::Hash256;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Ledger already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("No ledger found at {0}, create one with 'createblockchain' first")]
    NotInitialized(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Previous transaction {0} is missing from the ledger")]
    PrevTransactionMissing(Hash256),

    #[error("Transaction {0} not found")]
    NotFound(Hash256),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Double spend detected for output {0}")]
    DoubleSpend(String),

    #[error("No nonce below target within {ceiling} attempts")]
    MiningExhausted { ceiling: u64 },

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
