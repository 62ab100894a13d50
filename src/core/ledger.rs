use crate::config::MiningConfig;
use crate::consensus::validation::TransactionValidator;
use crate::core::utxo::UtxoIndex;
use crate::core::{Block, Transaction};
use crate::crypto::hash::Hash256;
use crate::crypto::keys::{Address, PrivateKey};
use crate::mining::ProofOfWork;
use crate::storage::Database;
use crate::{LedgerError, Result};
use std::path::{Path, PathBuf};

/// The persisted, hash-linked chain of blocks. Owns its store exclusively.
#[derive(Debug)]
pub struct Ledger {
    tip: Hash256,
    path: PathBuf,
    db: Database,
    pow: ProofOfWork,
    validator: TransactionValidator,
}

impl Ledger {
    /// Opens an existing ledger. Fails with `NotInitialized` when no tip is recorded.
    pub fn open<P: AsRef<Path>>(path: P, mining: &MiningConfig) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LedgerError::NotInitialized(path.display().to_string()));
        }

        let db = Database::open(path)?;
        let tip = db
            .get_tip()?
            .ok_or_else(|| LedgerError::NotInitialized(path.display().to_string()))?;

        log::debug!("Opened ledger at {} with tip {}", path.display(), tip);
        Ok(Self::with_parts(tip, path, db, mining))
    }

    /// Creates a new ledger whose genesis block pays the reward to `reward_address`.
    pub fn init_genesis<P: AsRef<Path>>(
        path: P,
        reward_address: &Address,
        memo: &str,
        mining: &MiningConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        let db = Database::open(path)?;
        if db.get_tip()?.is_some() {
            return Err(LedgerError::AlreadyInitialized(path.display().to_string()));
        }

        let pow = ProofOfWork::new(mining);
        let coinbase = Transaction::new_coinbase(reward_address, memo)?;
        let genesis = pow.mine_block(None, vec![coinbase])?;
        db.commit_block(&genesis)?;

        log::info!("🌱 Genesis block {} created, reward to {}", genesis.hash, reward_address);
        Ok(Self::with_parts(genesis.hash, path, db, mining))
    }

    fn with_parts(tip: Hash256, path: &Path, db: Database, mining: &MiningConfig) -> Self {
        Self {
            tip,
            path: path.to_path_buf(),
            db,
            pow: ProofOfWork::new(mining),
            validator: TransactionValidator::new(),
        }
    }

    pub fn tip(&self) -> Hash256 {
        self.tip
    }

    pub fn proof_of_work(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Validates `transactions`, mines a block on the current tip and persists it.
    /// Nothing is written when validation or mining fails.
    pub fn append_block(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        let tip = self
            .db
            .get_tip()?
            .ok_or_else(|| LedgerError::NotInitialized(self.path.display().to_string()))?;

        if let Err(e) = self.validator.validate_block_transactions(&transactions, self) {
            log::warn!("❌ Rejected block candidate on {}: {}", tip, e);
            return Err(e);
        }

        let block = self.pow.mine_block(Some(tip), transactions)?;
        self.db.commit_block(&block)?;
        self.tip = block.hash;

        log::info!(
            "✅ Block {} appended with {} transactions",
            block.hash,
            block.transaction_count()
        );
        Ok(block)
    }

    /// Walks from the tip as of this call back to genesis.
    pub fn iter(&self) -> LedgerIterator<'_> {
        LedgerIterator {
            db: &self.db,
            next: Some(self.tip),
        }
    }

    pub fn find_transaction(&self, id: &Hash256) -> Result<Transaction> {
        for block in self.iter() {
            if let Some(tx) = block?.transactions.into_iter().find(|tx| &tx.id == id) {
                return Ok(tx);
            }
        }

        Err(LedgerError::NotFound(*id))
    }

    pub fn sign_transaction(&self, tx: &mut Transaction, private_key: &PrivateKey) -> Result<()> {
        tx.sign(private_key, |id| self.find_transaction(id))
    }

    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        tx.verify(|id| self.find_transaction(id))
    }

    pub fn utxo(&self) -> UtxoIndex<'_> {
        UtxoIndex::new(self)
    }
}

/// Backward cursor over the chain. Ends after genesis or at the first error.
pub struct LedgerIterator<'a> {
    db: &'a Database,
    next: Option<Hash256>,
}

impl Iterator for LedgerIterator<'_> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;

        match self.db.get_block(&hash) {
            Ok(Some(block)) => {
                self.next = block.prev_hash;
                Some(Ok(block))
            }
            Ok(None) => Some(Err(LedgerError::Storage(format!(
                "Block {} is linked from the chain but missing from storage",
                hash
            )))),
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use tempfile::TempDir;

    fn config() -> MiningConfig {
        MiningConfig::single_threaded()
    }

    #[test]
    fn test_open_missing_ledger() -> Result<()> {
        let temp_dir = TempDir::new()?;

        let err = Ledger::open(temp_dir.path().join("absent"), &config()).unwrap_err();
        assert!(matches!(err, LedgerError::NotInitialized(_)));

        let err = Ledger::open(temp_dir.path(), &config()).unwrap_err();
        assert!(matches!(err, LedgerError::NotInitialized(_)));
        Ok(())
    }

    #[test]
    fn test_genesis_is_created_once() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let address = KeyPair::new()?.address();

        let ledger = Ledger::init_genesis(temp_dir.path(), &address, "genesis", &config())?;
        let blocks: Vec<Block> = ledger.iter().collect::<Result<_>>()?;
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_genesis());
        assert_eq!(blocks[0].hash, ledger.tip());
        assert!(ledger.proof_of_work().validate(&blocks[0]));
        drop(ledger);

        let err = Ledger::init_genesis(temp_dir.path(), &address, "again", &config()).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyInitialized(_)));
        Ok(())
    }

    #[test]
    fn test_append_links_to_previous_tip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let alice = KeyPair::new()?;
        let bob = KeyPair::new()?;
        let mut ledger = Ledger::init_genesis(temp_dir.path(), &alice.address(), "", &config())?;
        let genesis_hash = ledger.tip();

        let mut tx = Transaction::new_transfer(&alice.locking_hash(), &bob.address(), 25, &ledger.utxo())?;
        ledger.sign_transaction(&mut tx, &alice.private_key)?;
        assert!(ledger.verify_transaction(&tx)?);

        let block = ledger.append_block(vec![tx.clone()])?;
        assert_eq!(block.prev_hash, Some(genesis_hash));
        assert_eq!(ledger.tip(), block.hash);
        assert_eq!(ledger.find_transaction(&tx.id)?, tx);

        let hashes: Vec<Hash256> = ledger.iter().map(|b| b.map(|b| b.hash)).collect::<Result<_>>()?;
        assert_eq!(hashes, vec![block.hash, genesis_hash]);
        Ok(())
    }

    #[test]
    fn test_iterator_is_restartable_and_reopen_keeps_tip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let address = KeyPair::new()?.address();
        let tip = Ledger::init_genesis(temp_dir.path(), &address, "", &config())?.tip();

        let ledger = Ledger::open(temp_dir.path(), &config())?;
        assert_eq!(ledger.tip(), tip);
        assert_eq!(ledger.iter().count(), 1);
        assert_eq!(ledger.iter().count(), 1);
        Ok(())
    }

    #[test]
    fn test_find_unknown_transaction() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let ledger = Ledger::init_genesis(temp_dir.path(), &KeyPair::new()?.address(), "", &config())?;

        let missing = Hash256::hash(b"missing");
        let err = ledger.find_transaction(&missing).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(id) if id == missing));
        Ok(())
    }
}
