//! Proof-of-work for new blocks

pub mod pow;

pub use pow::{ProofOfWork, DIFFICULTY};
