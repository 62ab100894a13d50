use crate::config::MiningConfig;
use crate::core::{Block, Transaction};
use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

/// Leading zero bits every block hash must carry. Never adjusted.
pub const DIFFICULTY: u32 = 12;

const PROGRESS_INTERVAL: u64 = 1 << 20;
const NOT_FOUND: u64 = u64::MAX;

/// Fixed-difficulty SHA-256 puzzle. A hash is accepted when, read as a
/// big-endian 256-bit integer, it is strictly below `2^(256 - difficulty)`.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    difficulty: u32,
    max_nonce: u64,
    threads: usize,
}

impl ProofOfWork {
    pub fn new(config: &MiningConfig) -> Self {
        Self::with_difficulty(DIFFICULTY, config)
    }

    pub fn with_difficulty(difficulty: u32, config: &MiningConfig) -> Self {
        Self {
            difficulty: difficulty.min(256),
            max_nonce: config.max_nonce,
            threads: config.threads.max(1),
        }
    }

    /// `prevHash ++ merkleOf(transactions) ++ be(nonce) ++ be(difficulty)`
    pub fn prepare_digest_input(&self, block: &Block, nonce: u64) -> Vec<u8> {
        let mut data = self.digest_prefix(block.prev_hash.as_ref(), &block.transactions);
        data.extend_from_slice(&nonce.to_be_bytes());
        data.extend_from_slice(&u64::from(self.difficulty).to_be_bytes());
        data
    }

    fn digest_prefix(&self, prev_hash: Option<&Hash256>, transactions: &[Transaction]) -> Vec<u8> {
        let mut data = Vec::with_capacity(32 + 32 + 16);
        if let Some(prev_hash) = prev_hash {
            data.extend_from_slice(prev_hash.as_bytes());
        }
        data.extend_from_slice(Block::hash_transactions(transactions).as_bytes());
        data
    }

    pub fn meets_target(&self, hash: &Hash256) -> bool {
        leading_zero_bits(hash) >= self.difficulty
    }

    /// Finds the smallest nonce in `0..max_nonce` whose digest meets the target.
    ///
    /// Worker `i` of `T` tries `i, i + T, i + 2T, ...` and publishes hits through a
    /// shared minimum; a worker stops as soon as its next candidate is above it.
    pub fn mine(&self, prev_hash: Option<&Hash256>, transactions: &[Transaction]) -> Result<(u64, Hash256)> {
        let prefix = self.digest_prefix(prev_hash, transactions);
        let best = AtomicU64::new(NOT_FOUND);
        let workers = self.threads as u64;
        let started = Instant::now();

        log::debug!(
            "⛏️  Mining {} transactions with {} threads at difficulty {}",
            transactions.len(), workers, self.difficulty
        );

        thread::scope(|scope| {
            for worker in 0..workers {
                let prefix = &prefix;
                let best = &best;
                scope.spawn(move || self.search(prefix, worker, workers, best));
            }
        });

        let nonce = best.load(Ordering::SeqCst);
        if nonce == NOT_FOUND {
            return Err(LedgerError::MiningExhausted { ceiling: self.max_nonce });
        }

        let hash = self.digest(&prefix, nonce);
        log::info!(
            "⛏️  Found nonce {} in {:.2}s: {}",
            nonce,
            started.elapsed().as_secs_f64(),
            hash
        );

        Ok((nonce, hash))
    }

    fn search(&self, prefix: &[u8], first: u64, step: u64, best: &AtomicU64) {
        let mut data = Vec::with_capacity(prefix.len() + 16);
        data.extend_from_slice(prefix);
        let nonce_offset = data.len();
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&u64::from(self.difficulty).to_be_bytes());

        let mut nonce = first;
        let mut tried = 0u64;

        while nonce < self.max_nonce && nonce < best.load(Ordering::Relaxed) {
            data[nonce_offset..nonce_offset + 8].copy_from_slice(&nonce.to_be_bytes());
            let hash = Hash256::hash(&data);

            if self.meets_target(&hash) {
                best.fetch_min(nonce, Ordering::SeqCst);
                return;
            }

            tried += 1;
            if tried % PROGRESS_INTERVAL == 0 {
                log::debug!("Worker {} tried {} nonces (at {})", first, tried, nonce);
            }

            nonce = match nonce.checked_add(step) {
                Some(next) => next,
                None => return,
            };
        }
    }

    fn digest(&self, prefix: &[u8], nonce: u64) -> Hash256 {
        let mut data = prefix.to_vec();
        data.extend_from_slice(&nonce.to_be_bytes());
        data.extend_from_slice(&u64::from(self.difficulty).to_be_bytes());
        Hash256::hash(&data)
    }

    /// Mines and assembles a block on top of `prev_hash`.
    pub fn mine_block(&self, prev_hash: Option<Hash256>, transactions: Vec<Transaction>) -> Result<Block> {
        let (nonce, hash) = self.mine(prev_hash.as_ref(), &transactions)?;

        Ok(Block {
            hash,
            prev_hash,
            transactions,
            nonce,
        })
    }

    /// Recomputes the digest for the stored nonce; it must match the stored
    /// hash and sit below the target.
    pub fn validate(&self, block: &Block) -> bool {
        let hash = Hash256::hash(&self.prepare_digest_input(block, block.nonce));
        hash == block.hash && self.meets_target(&hash)
    }
}

fn leading_zero_bits(hash: &Hash256) -> u32 {
    let mut bits = 0;
    for byte in hash.as_bytes() {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}
