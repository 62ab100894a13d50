use crate::core::ledger::Ledger;
use crate::core::transaction::REWARD;
use crate::core::Transaction;
use crate::crypto::hash::{Hash160, Hash256};
use crate::{LedgerError, Result};
use std::collections::{HashMap, HashSet};

type SpentView = HashMap<Hash256, HashSet<usize>>;

/// Checks a candidate block's transactions against the chain before mining.
#[derive(Debug, Clone, Default)]
pub struct TransactionValidator;

impl TransactionValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_block_transactions(&self, transactions: &[Transaction], ledger: &Ledger) -> Result<()> {
        if transactions.is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "Block must contain at least one transaction".to_string(),
            ));
        }

        let mut claimed: HashSet<(Hash256, usize)> = HashSet::new();
        let mut spent_views: HashMap<Hash160, SpentView> = HashMap::new();

        for tx in transactions {
            if tx.is_coinbase() {
                self.validate_coinbase(tx)?;
                continue;
            }

            self.validate_transaction(tx, ledger)?;
            self.check_double_spend(tx, ledger, &mut claimed, &mut spent_views)?;
        }

        log::debug!("✅ {} transactions passed validation", transactions.len());
        Ok(())
    }

    /// Structure, value balance and signatures of a single non-coinbase transaction.
    pub fn validate_transaction(&self, tx: &Transaction, ledger: &Ledger) -> Result<()> {
        self.validate_structure(tx)?;

        let mut input_total = 0u64;
        for input in &tx.inputs {
            let (txid, index) = input.outpoint().ok_or_else(|| {
                LedgerError::InvalidTransaction(format!("Transaction {} has an input without an outpoint", tx.id))
            })?;

            let prev_tx = ledger.find_transaction(&txid).map_err(|e| match e {
                LedgerError::NotFound(id) => LedgerError::PrevTransactionMissing(id),
                other => other,
            })?;

            let prev_output = prev_tx.outputs.get(index).ok_or_else(|| {
                LedgerError::InvalidTransaction(format!("Output {}:{} does not exist", txid, index))
            })?;

            input_total = input_total.checked_add(prev_output.value).ok_or_else(|| {
                LedgerError::InvalidTransaction("Input value overflow".to_string())
            })?;
        }

        let output_total = tx
            .outputs
            .iter()
            .try_fold(0u64, |total, output| total.checked_add(output.value))
            .ok_or_else(|| LedgerError::InvalidTransaction("Output value overflow".to_string()))?;

        if input_total < output_total {
            return Err(LedgerError::InvalidTransaction(format!(
                "Outputs ({}) exceed inputs ({}) in {}",
                output_total, input_total, tx.id
            )));
        }

        if !ledger.verify_transaction(tx)? {
            return Err(LedgerError::InvalidTransaction(format!(
                "Signature verification failed for {}",
                tx.id
            )));
        }

        Ok(())
    }

    fn validate_structure(&self, tx: &Transaction) -> Result<()> {
        if tx.inputs.is_empty() {
            return Err(LedgerError::InvalidTransaction(format!("Transaction {} has no inputs", tx.id)));
        }

        if tx.outputs.is_empty() {
            return Err(LedgerError::InvalidTransaction(format!("Transaction {} has no outputs", tx.id)));
        }

        if tx.outputs.iter().any(|output| output.value == 0) {
            return Err(LedgerError::InvalidTransaction(format!(
                "Transaction {} has a zero-value output",
                tx.id
            )));
        }

        if !tx.id_matches_content()? {
            return Err(LedgerError::InvalidTransaction(format!(
                "Transaction {} does not hash to its id",
                tx.id
            )));
        }

        Ok(())
    }

    fn validate_coinbase(&self, tx: &Transaction) -> Result<()> {
        if tx.outputs.len() != 1 || tx.outputs[0].value != REWARD {
            return Err(LedgerError::InvalidTransaction(format!(
                "Coinbase {} must pay exactly {}",
                tx.id, REWARD
            )));
        }

        if !tx.id_matches_content()? {
            return Err(LedgerError::InvalidTransaction(format!(
                "Coinbase {} does not hash to its id",
                tx.id
            )));
        }

        Ok(())
    }

    /// Rejects inputs whose output is already spent in the chain (as seen by the
    /// spender's own by-address view) or claimed twice within the candidate block.
    fn check_double_spend(
        &self,
        tx: &Transaction,
        ledger: &Ledger,
        claimed: &mut HashSet<(Hash256, usize)>,
        spent_views: &mut HashMap<Hash160, SpentView>,
    ) -> Result<()> {
        for input in &tx.inputs {
            let Some(outpoint) = input.outpoint() else {
                continue;
            };
            let (txid, index) = outpoint;

            let lock = Hash160::hash_sha256(&input.pub_key);
            if !spent_views.contains_key(&lock) {
                spent_views.insert(lock, ledger.utxo().spent_outputs(&lock)?);
            }

            let already_spent = spent_views
                .get(&lock)
                .map_or(false, |spent| spent.get(&txid).map_or(false, |indices| indices.contains(&index)));

            if already_spent || !claimed.insert(outpoint) {
                log::warn!("Double spend of {}:{} in {}", txid, index, tx.id);
                return Err(LedgerError::DoubleSpend(format!("{}:{}", txid, index)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MiningConfig;
    use crate::core::{TxInput, TxOutput};
    use crate::crypto::KeyPair;
    use tempfile::TempDir;

    fn setup() -> Result<(TempDir, Ledger, KeyPair)> {
        let temp_dir = TempDir::new()?;
        let owner = KeyPair::new()?;
        let ledger = Ledger::init_genesis(
            temp_dir.path(),
            &owner.address(),
            "",
            &MiningConfig::single_threaded(),
        )?;
        Ok((temp_dir, ledger, owner))
    }

    fn genesis_tx(ledger: &Ledger) -> Result<Transaction> {
        let genesis = ledger.iter().last().ok_or_else(|| LedgerError::Storage("empty chain".to_string()))??;
        Ok(genesis.transactions[0].clone())
    }

    #[test]
    fn test_valid_transfer_passes() -> Result<()> {
        let (_temp_dir, ledger, owner) = setup()?;
        let recipient = KeyPair::new()?;

        let mut tx = Transaction::new_transfer(&owner.locking_hash(), &recipient.address(), 30, &ledger.utxo())?;
        ledger.sign_transaction(&mut tx, &owner.private_key)?;

        TransactionValidator::new().validate_block_transactions(&[tx], &ledger)?;
        Ok(())
    }

    #[test]
    fn test_signed_transfer_passes_id_check() -> Result<()> {
        let (_temp_dir, ledger, owner) = setup()?;
        let recipient = KeyPair::new()?;

        let mut tx = Transaction::new_transfer(&owner.locking_hash(), &recipient.address(), 30, &ledger.utxo())?;
        let unsigned_id = tx.id;
        ledger.sign_transaction(&mut tx, &owner.private_key)?;
        assert_eq!(tx.id, unsigned_id);

        TransactionValidator::new().validate_transaction(&tx, &ledger)?;
        Ok(())
    }

    #[test]
    fn test_content_changed_after_id_is_rejected() -> Result<()> {
        let (_temp_dir, ledger, owner) = setup()?;
        let recipient = KeyPair::new()?;

        let mut tx = Transaction::new_transfer(&owner.locking_hash(), &recipient.address(), 30, &ledger.utxo())?;
        ledger.sign_transaction(&mut tx, &owner.private_key)?;
        tx.outputs[1].value -= 1;

        let err = TransactionValidator::new().validate_transaction(&tx, &ledger).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(ref msg) if msg.contains("does not hash to its id")));
        Ok(())
    }

    #[test]
    fn test_empty_block_is_rejected() -> Result<()> {
        let (_temp_dir, ledger, _) = setup()?;
        assert!(TransactionValidator::new().validate_block_transactions(&[], &ledger).is_err());
        Ok(())
    }

    #[test]
    fn test_overspending_outputs_are_rejected() -> Result<()> {
        let (_temp_dir, ledger, owner) = setup()?;
        let funding = genesis_tx(&ledger)?;

        let mut tx = Transaction::new(
            vec![TxInput::new(funding.id, 0)?],
            vec![TxOutput { value: 101, locking_hash: owner.locking_hash() }],
        )?;
        ledger.sign_transaction(&mut tx, &owner.private_key)?;

        let err = TransactionValidator::new().validate_transaction(&tx, &ledger).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
        Ok(())
    }

    #[test]
    fn test_unknown_previous_transaction() -> Result<()> {
        let (_temp_dir, ledger, owner) = setup()?;

        let tx = Transaction::new(
            vec![TxInput::new(Hash256::hash(b"nowhere"), 0)?],
            vec![TxOutput { value: 1, locking_hash: owner.locking_hash() }],
        )?;

        let err = TransactionValidator::new().validate_transaction(&tx, &ledger).unwrap_err();
        assert!(matches!(err, LedgerError::PrevTransactionMissing(_)));
        Ok(())
    }

    #[test]
    fn test_unsigned_transfer_is_rejected() -> Result<()> {
        let (_temp_dir, ledger, owner) = setup()?;
        let recipient = KeyPair::new()?;

        let tx = Transaction::new_transfer(&owner.locking_hash(), &recipient.address(), 30, &ledger.utxo())?;

        let err = TransactionValidator::new().validate_transaction(&tx, &ledger).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
        Ok(())
    }

    #[test]
    fn test_same_output_twice_in_one_block() -> Result<()> {
        let (_temp_dir, ledger, owner) = setup()?;
        let first_recipient = KeyPair::new()?;
        let second_recipient = KeyPair::new()?;

        let mut first = Transaction::new_transfer(&owner.locking_hash(), &first_recipient.address(), 10, &ledger.utxo())?;
        let mut second = Transaction::new_transfer(&owner.locking_hash(), &second_recipient.address(), 20, &ledger.utxo())?;
        ledger.sign_transaction(&mut first, &owner.private_key)?;
        ledger.sign_transaction(&mut second, &owner.private_key)?;

        let err = TransactionValidator::new()
            .validate_block_transactions(&[first, second], &ledger)
            .unwrap_err();
        assert!(matches!(err, LedgerError::DoubleSpend(_)));
        Ok(())
    }

    #[test]
    fn test_forged_coinbase_is_rejected() -> Result<()> {
        let (_temp_dir, ledger, owner) = setup()?;

        let mut coinbase = Transaction::new_coinbase(&owner.address(), "")?;
        coinbase.outputs[0].value = 1_000_000;

        let err = TransactionValidator::new()
            .validate_block_transactions(&[coinbase], &ledger)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
        Ok(())
    }
}
