use crate::core::Transaction;
use crate::crypto::hash::Hash256;
use serde::{Deserialize, Serialize};

/// A mined, immutable entry of the ledger. Only the genesis block has no parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: Hash256,
    pub prev_hash: Option<Hash256>,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
}

impl Block {
    /// SHA-256 over the concatenated transaction IDs, in block order.
    pub fn hash_transactions(transactions: &[Transaction]) -> Hash256 {
        let mut data = Vec::with_capacity(transactions.len() * 32);
        for tx in transactions {
            data.extend_from_slice(tx.id.as_bytes());
        }
        Hash256::hash(&data)
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_none()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::Result;

    #[test]
    fn test_hash_transactions_depends_on_order() -> Result<()> {
        let first = Transaction::new_coinbase(&KeyPair::new()?.address(), "one")?;
        let second = Transaction::new_coinbase(&KeyPair::new()?.address(), "two")?;

        let forward = Block::hash_transactions(&[first.clone(), second.clone()]);
        let backward = Block::hash_transactions(&[second, first]);

        assert_ne!(forward, backward);
        assert_eq!(Block::hash_transactions(&[]), Hash256::hash(&[]));
        Ok(())
    }

    #[test]
    fn test_block_accessors() -> Result<()> {
        let coinbase = Transaction::new_coinbase(&KeyPair::new()?.address(), "")?;
        let block = Block {
            hash: Hash256::zero(),
            prev_hash: None,
            transactions: vec![coinbase.clone()],
            nonce: 0,
        };

        assert!(block.is_genesis());
        assert_eq!(block.transaction_count(), 1);
        assert_eq!(Block::hash_transactions(&block.transactions), Hash256::hash(coinbase.id.as_bytes()));
        Ok(())
    }
}
