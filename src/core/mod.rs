//! Core ledger components

pub mod codec;
pub mod block;
pub mod transaction;
pub mod ledger;
pub mod utxo;

pub use codec::Codec;
pub use block::Block;
pub use transaction::{Transaction, TxInput, TxOutput, REWARD};
pub use ledger::{Ledger, LedgerIterator};
pub use utxo::{UtxoIndex, UnspentTransaction};
