use crate::core::codec::Codec;
use crate::core::Block;
use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Reserved key holding the hash of the current chain tip.
pub const TIP_KEY: &[u8] = b"lh";

/// Block store: every block under its own hash, plus the tip pointer.
#[derive(Debug, Clone)]
pub struct Database {
    db: Arc<Db>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|e| {
            LedgerError::StorageUnavailable(format!("{}: {}", path.display(), e))
        })?;

        log::debug!("💾 Opened block store at {}", path.display());
        Ok(Self { db: Arc::new(db) })
    }

    pub fn get_tip(&self) -> Result<Option<Hash256>> {
        match self.db.get(TIP_KEY)? {
            Some(bytes) => Hash256::from_slice(&bytes)
                .map(Some)
                .ok_or_else(|| LedgerError::Storage("Invalid tip hash length".to_string())),
            None => Ok(None),
        }
    }

    pub fn get_block(&self, hash: &Hash256) -> Result<Option<Block>> {
        match self.db.get(hash.as_bytes())? {
            Some(data) => {
                let block = Block::decode(&data)
                    .map_err(|e| LedgerError::Storage(format!("Failed to decode block {}: {}", hash, e)))?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    /// Writes the block record and moves the tip in one transaction, then flushes.
    /// Readers never observe a tip whose block is missing.
    pub fn commit_block(&self, block: &Block) -> Result<()> {
        let block_data = block.encode()?;
        let block_hash = block.hash;

        self.db
            .transaction(|tx| {
                tx.insert(block_hash.as_bytes().as_slice(), block_data.as_slice())?;
                tx.insert(TIP_KEY, block_hash.as_bytes().as_slice())?;
                Ok::<(), ConflictableTransactionError<LedgerError>>(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(inner) => inner,
                TransactionError::Storage(inner) => LedgerError::Database(inner),
            })?;

        self.db.flush()?;

        log::debug!("💾 Saved block {} and moved tip", block_hash);
        Ok(())
    }
}
