//! Acceptance rules applied before a block is mined

pub mod validation;

pub use validation::TransactionValidator;
