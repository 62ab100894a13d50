use crate::core::ledger::Ledger;
use crate::core::{Transaction, TxOutput};
use crate::crypto::hash::{Hash160, Hash256};
use crate::Result;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A transaction holding at least one unspent output for the queried lock,
/// together with the indices of those outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentTransaction {
    pub transaction: Transaction,
    pub outputs: Vec<usize>,
}

impl UnspentTransaction {
    pub fn unspent_outputs(&self) -> impl Iterator<Item = (usize, &TxOutput)> + '_ {
        self.outputs
            .iter()
            .filter_map(|&index| self.transaction.outputs.get(index).map(|output| (index, output)))
    }
}

/// Unspent-output view derived from a full tip-to-genesis scan on every query.
///
/// Spends are tracked per locking hash: an input only suppresses an output when
/// the input's public key hashes to the lock being queried. This is a by-address
/// view, not a global UTXO set.
#[derive(Debug, Clone, Copy)]
pub struct UtxoIndex<'a> {
    ledger: &'a Ledger,
}

impl<'a> UtxoIndex<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    /// Outputs already consumed by inputs signed with the key behind `locking_hash`.
    pub fn spent_outputs(&self, locking_hash: &Hash160) -> Result<HashMap<Hash256, HashSet<usize>>> {
        let mut spent: HashMap<Hash256, HashSet<usize>> = HashMap::new();

        for block in self.ledger.iter() {
            for tx in block?.transactions.iter().filter(|tx| !tx.is_coinbase()) {
                record_spends(tx, locking_hash, &mut spent);
            }
        }

        Ok(spent)
    }

    pub fn find_unspent_transactions(&self, locking_hash: &Hash160) -> Result<Vec<UnspentTransaction>> {
        let mut spent: HashMap<Hash256, HashSet<usize>> = HashMap::new();
        let mut unspent = Vec::new();
        let mut blocks = 0usize;

        for block in self.ledger.iter() {
            let block = block?;
            blocks += 1;

            // Later transactions first so in-block spends are seen before their outputs
            for tx in block.transactions.into_iter().rev() {
                let spent_here = spent.get(&tx.id);
                let outputs: Vec<usize> = tx
                    .outputs
                    .iter()
                    .enumerate()
                    .filter(|(index, output)| {
                        output.is_locked_with_key(locking_hash)
                            && !spent_here.map_or(false, |indices| indices.contains(index))
                    })
                    .map(|(index, _)| index)
                    .collect();

                if !tx.is_coinbase() {
                    record_spends(&tx, locking_hash, &mut spent);
                }

                if !outputs.is_empty() {
                    unspent.push(UnspentTransaction { transaction: tx, outputs });
                }
            }
        }

        log::debug!(
            "UTXO scan for {} over {} blocks: {} transactions with unspent outputs",
            locking_hash, blocks, unspent.len()
        );

        Ok(unspent)
    }

    pub fn find_utxos(&self, locking_hash: &Hash160) -> Result<Vec<TxOutput>> {
        let utxos = self
            .find_unspent_transactions(locking_hash)?
            .iter()
            .flat_map(|unspent| unspent.unspent_outputs().map(|(_, output)| output.clone()).collect::<Vec<_>>())
            .filter(|output| output.is_locked_with_key(locking_hash))
            .collect();

        Ok(utxos)
    }

    /// Greedily gathers outputs in traversal order until `amount` is covered.
    /// Under-funding is reported only through the returned total.
    pub fn find_spendable_outputs(
        &self,
        locking_hash: &Hash160,
        amount: u64,
    ) -> Result<(u64, BTreeMap<Hash256, Vec<usize>>)> {
        let mut accumulated = 0u64;
        let mut selected: BTreeMap<Hash256, Vec<usize>> = BTreeMap::new();

        'scan: for unspent in self.find_unspent_transactions(locking_hash)? {
            for (index, output) in unspent.unspent_outputs() {
                if accumulated >= amount {
                    break 'scan;
                }
                if !output.is_locked_with_key(locking_hash) {
                    continue;
                }

                accumulated = accumulated.saturating_add(output.value);
                selected.entry(unspent.transaction.id).or_default().push(index);
            }
        }

        Ok((accumulated, selected))
    }

    pub fn balance(&self, locking_hash: &Hash160) -> Result<u64> {
        Ok(self
            .find_utxos(locking_hash)?
            .iter()
            .map(|output| output.value)
            .sum())
    }
}

fn record_spends(tx: &Transaction, locking_hash: &Hash160, spent: &mut HashMap<Hash256, HashSet<usize>>) {
    for input in tx.inputs.iter().filter(|input| input.uses_key(locking_hash)) {
        if let Some((txid, index)) = input.outpoint() {
            spent.entry(txid).or_default().insert(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MiningConfig;
    use crate::core::TxInput;
    use crate::crypto::KeyPair;
    use crate::LedgerError;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        ledger: Ledger,
        alice: KeyPair,
        bob: KeyPair,
    }

    fn fixture() -> Result<Fixture> {
        let temp_dir = TempDir::new()?;
        let alice = KeyPair::new()?;
        let bob = KeyPair::new()?;
        let ledger = Ledger::init_genesis(
            temp_dir.path(),
            &alice.address(),
            "genesis",
            &MiningConfig::single_threaded(),
        )?;
        Ok(Fixture { _temp_dir: temp_dir, ledger, alice, bob })
    }

    fn send(ledger: &mut Ledger, from: &KeyPair, to: &KeyPair, amount: u64) -> Result<()> {
        let mut tx = Transaction::new_transfer(&from.locking_hash(), &to.address(), amount, &ledger.utxo())?;
        ledger.sign_transaction(&mut tx, &from.private_key)?;
        ledger.append_block(vec![tx])?;
        Ok(())
    }

    #[test]
    fn test_genesis_reward_is_unspent() -> Result<()> {
        let f = fixture()?;
        let utxo = f.ledger.utxo();

        let unspent = utxo.find_unspent_transactions(&f.alice.locking_hash())?;
        assert_eq!(unspent.len(), 1);
        assert!(unspent[0].transaction.is_coinbase());
        assert_eq!(unspent[0].outputs, vec![0]);

        assert_eq!(utxo.balance(&f.alice.locking_hash())?, 100);
        assert_eq!(utxo.balance(&f.bob.locking_hash())?, 0);
        Ok(())
    }

    #[test]
    fn test_spent_output_is_suppressed() -> Result<()> {
        let mut f = fixture()?;
        send(&mut f.ledger, &f.alice, &f.bob, 40)?;

        let utxo = f.ledger.utxo();
        let alice_outputs = utxo.find_utxos(&f.alice.locking_hash())?;
        assert_eq!(alice_outputs.len(), 1);
        assert_eq!(alice_outputs[0].value, 60);
        assert_eq!(utxo.balance(&f.bob.locking_hash())?, 40);

        let spent = utxo.spent_outputs(&f.alice.locking_hash())?;
        assert_eq!(spent.values().map(HashSet::len).sum::<usize>(), 1);
        Ok(())
    }

    #[test]
    fn test_spendable_outputs_stop_once_covered() -> Result<()> {
        let mut f = fixture()?;
        send(&mut f.ledger, &f.alice, &f.bob, 10)?;
        send(&mut f.ledger, &f.alice, &f.bob, 20)?;

        let utxo = f.ledger.utxo();
        let (accumulated, selected) = utxo.find_spendable_outputs(&f.bob.locking_hash(), 5)?;
        assert_eq!(selected.values().map(Vec::len).sum::<usize>(), 1);
        assert!(accumulated >= 5);

        let (accumulated, selected) = utxo.find_spendable_outputs(&f.bob.locking_hash(), 25)?;
        assert_eq!(accumulated, 30);
        assert_eq!(selected.len(), 2);
        Ok(())
    }

    #[test]
    fn test_underfunded_request_reports_total() -> Result<()> {
        let f = fixture()?;
        let (accumulated, selected) = f.ledger.utxo().find_spendable_outputs(&f.alice.locking_hash(), 1000)?;

        assert_eq!(accumulated, 100);
        assert_eq!(selected.len(), 1);
        Ok(())
    }

    #[test]
    fn test_spend_by_other_key_is_not_tracked() -> Result<()> {
        let f = fixture()?;
        let genesis_tx = f.ledger.utxo().find_unspent_transactions(&f.alice.locking_hash())?[0]
            .transaction
            .clone();

        // An input claiming Alice's output but carrying Bob's key only counts for Bob's view
        let mut input = TxInput::new(genesis_tx.id, 0)?;
        input.pub_key = f.bob.public_key.to_bytes().to_vec();
        let foreign = Transaction::new(vec![input], vec![])?;

        let mut spent = HashMap::new();
        record_spends(&foreign, &f.alice.locking_hash(), &mut spent);
        assert!(spent.is_empty());

        record_spends(&foreign, &f.bob.locking_hash(), &mut spent);
        assert!(spent[&genesis_tx.id].contains(&0));
        Ok(())
    }

    #[test]
    fn test_transfer_without_funds_is_rejected() -> Result<()> {
        let f = fixture()?;
        let err = Transaction::new_transfer(&f.bob.locking_hash(), &f.alice.address(), 1, &f.ledger.utxo())
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientFunds { required: 1, available: 0 }));
        Ok(())
    }
}
