use crate::core::utxo::UtxoIndex;
use crate::crypto::hash::{Hash160, Hash256};
use crate::crypto::keys::{Address, PrivateKey, PublicKey};
use crate::crypto::signatures::Signature;
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Subsidy paid by every coinbase transaction.
pub const REWARD: u64 = 100;

/// Output index carried by the single input of a coinbase transaction.
pub const COINBASE_OUTPUT_INDEX: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash256,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_tx_id: Option<Hash256>,
    pub output_index: i64,
    pub signature: Vec<u8>,
    /// `X || Y` of the spender's key once signed. Coinbase inputs carry memo bytes here.
    pub pub_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub locking_hash: Hash160,
}

/// Same field layout as `Transaction`, borrowed, so the ID can be hashed
/// over a zero placeholder without cloning or mutating the transaction.
#[derive(Serialize)]
struct IdPreimage<'a> {
    id: Hash256,
    inputs: &'a [TxInput],
    outputs: &'a [TxOutput],
}

impl TxInput {
    pub fn new(prev_tx_id: Hash256, output_index: usize) -> Result<Self> {
        let output_index = i64::try_from(output_index).map_err(|_| {
            LedgerError::InvalidTransaction(format!("Output index {} is out of range", output_index))
        })?;

        Ok(Self {
            prev_tx_id: Some(prev_tx_id),
            output_index,
            signature: Vec::new(),
            pub_key: Vec::new(),
        })
    }

    pub fn uses_key(&self, locking_hash: &Hash160) -> bool {
        &Hash160::hash_sha256(&self.pub_key) == locking_hash
    }

    /// The `(txid, index)` pair this input spends, if it names a real output.
    pub fn outpoint(&self) -> Option<(Hash256, usize)> {
        let txid = self.prev_tx_id?;
        let index = usize::try_from(self.output_index).ok()?;
        Some((txid, index))
    }
}

impl TxOutput {
    pub fn new(value: u64, address: &Address) -> Result<Self> {
        Ok(Self {
            value,
            locking_hash: address.locking_hash()?,
        })
    }

    pub fn is_locked_with_key(&self, locking_hash: &Hash160) -> bool {
        &self.locking_hash == locking_hash
    }
}

impl Transaction {
    /// Builds a transaction whose ID is the hash of its own content.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Result<Self> {
        let id = Self::id_of(&inputs, &outputs)?;
        Ok(Self { id, inputs, outputs })
    }

    pub fn new_coinbase(to: &Address, memo: &str) -> Result<Self> {
        let memo = if memo.is_empty() {
            format!("Coins to {}", to)
        } else {
            memo.to_string()
        };

        let coinbase_input = TxInput {
            prev_tx_id: None,
            output_index: COINBASE_OUTPUT_INDEX,
            signature: Vec::new(),
            pub_key: memo.into_bytes(),
        };

        Self::new(vec![coinbase_input], vec![TxOutput::new(REWARD, to)?])
    }

    /// Spends enough of `from`'s outputs to pay `amount` to `to`, returning change to `from`.
    /// Inputs are left unsigned.
    pub fn new_transfer(
        from: &Hash160,
        to: &Address,
        amount: u64,
        utxo: &UtxoIndex<'_>,
    ) -> Result<Self> {
        if amount == 0 {
            return Err(LedgerError::InvalidTransaction("Transfer amount must be positive".to_string()));
        }

        let recipient = to.locking_hash()?;
        let (accumulated, spendable) = utxo.find_spendable_outputs(from, amount)?;

        if accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let inputs = spendable
            .iter()
            .flat_map(|(txid, indices)| indices.iter().map(move |&index| TxInput::new(*txid, index)))
            .collect::<Result<Vec<TxInput>>>()?;

        let mut outputs = vec![TxOutput { value: amount, locking_hash: recipient }];
        if accumulated > amount {
            outputs.push(TxOutput {
                value: accumulated - amount,
                locking_hash: *from,
            });
        }

        log::debug!(
            "Built transfer of {} from {} using {} inputs ({} accumulated)",
            amount, from, inputs.len(), accumulated
        );

        Self::new(inputs, outputs)
    }

    fn id_of(inputs: &[TxInput], outputs: &[TxOutput]) -> Result<Hash256> {
        let preimage = IdPreimage {
            id: Hash256::zero(),
            inputs,
            outputs,
        };
        Ok(Hash256::hash(&bincode::serialize(&preimage)?))
    }

    /// SHA-256 of the encoded transaction with `id` zeroed.
    pub fn compute_id(&self) -> Result<Hash256> {
        Self::id_of(&self.inputs, &self.outputs)
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].prev_tx_id.is_none()
            && self.inputs[0].output_index == COINBASE_OUTPUT_INDEX
    }

    /// Whether `id` still matches the content it was assigned over. Transfers get
    /// their id before signing, so the witness fields are left out of the check;
    /// a coinbase memo is part of its id.
    pub fn id_matches_content(&self) -> Result<bool> {
        let expected = if self.is_coinbase() {
            self.compute_id()?
        } else {
            self.trimmed_copy().compute_id()?
        };
        Ok(expected == self.id)
    }

    /// Copy with every input's signature and public key cleared.
    pub fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput {
                prev_tx_id: input.prev_tx_id,
                output_index: input.output_index,
                signature: Vec::new(),
                pub_key: Vec::new(),
            })
            .collect();

        Transaction {
            id: self.id,
            inputs,
            outputs: self.outputs.clone(),
        }
    }

    /// Signs every input with `private_key`. `resolve` looks up the transactions
    /// the inputs point at; a miss aborts before any input is touched.
    pub fn sign<F>(&mut self, private_key: &PrivateKey, resolve: F) -> Result<()>
    where
        F: FnMut(&Hash256) -> Result<Transaction>,
    {
        if self.is_coinbase() {
            return Ok(());
        }

        let previous = self.resolve_previous(resolve)?;
        let public_key = private_key.public_key();
        let mut trimmed = self.trimmed_copy();

        for index in 0..self.inputs.len() {
            let prev_output = previous_output(&self.inputs[index], &previous)?;
            let digest = signing_digest(&mut trimmed, index, prev_output)?;
            let signature = private_key.sign(&digest);

            let input = &mut self.inputs[index];
            input.signature = signature.to_bytes();
            input.pub_key = public_key.to_bytes().to_vec();
        }

        Ok(())
    }

    /// Checks every input's signature against the output it spends.
    /// Any failing input invalidates the whole transaction.
    pub fn verify<F>(&self, resolve: F) -> Result<bool>
    where
        F: FnMut(&Hash256) -> Result<Transaction>,
    {
        if self.is_coinbase() {
            return Ok(true);
        }

        let previous = self.resolve_previous(resolve)?;
        let mut trimmed = self.trimmed_copy();

        for (index, input) in self.inputs.iter().enumerate() {
            let prev_output = match previous_output(input, &previous) {
                Ok(output) => output,
                Err(_) => return Ok(false),
            };

            if !input.uses_key(&prev_output.locking_hash) {
                return Ok(false);
            }

            let digest = signing_digest(&mut trimmed, index, prev_output)?;

            let (signature, public_key) = match (
                Signature::from_bytes(&input.signature),
                PublicKey::from_bytes(&input.pub_key),
            ) {
                (Ok(signature), Ok(public_key)) => (signature, public_key),
                _ => return Ok(false),
            };

            if !public_key.verify(&digest, &signature).unwrap_or(false) {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn resolve_previous<F>(&self, mut resolve: F) -> Result<HashMap<Hash256, Transaction>>
    where
        F: FnMut(&Hash256) -> Result<Transaction>,
    {
        let mut previous = HashMap::new();

        for input in &self.inputs {
            let txid = input.prev_tx_id.ok_or_else(|| {
                LedgerError::InvalidTransaction(format!("Input of {} has no previous transaction", self.id))
            })?;

            if previous.contains_key(&txid) {
                continue;
            }

            let prev_tx = resolve(&txid).map_err(|e| match e {
                LedgerError::NotFound(id) => LedgerError::PrevTransactionMissing(id),
                other => other,
            })?;
            previous.insert(txid, prev_tx);
        }

        Ok(previous)
    }
}

fn previous_output<'p>(
    input: &TxInput,
    previous: &'p HashMap<Hash256, Transaction>,
) -> Result<&'p TxOutput> {
    let (txid, index) = input.outpoint().ok_or_else(|| {
        LedgerError::InvalidTransaction(format!("Input index {} is not spendable", input.output_index))
    })?;

    previous
        .get(&txid)
        .ok_or(LedgerError::PrevTransactionMissing(txid))?
        .outputs
        .get(index)
        .ok_or_else(|| LedgerError::InvalidTransaction(format!("{} has no output {}", txid, index)))
}

/// Per-input digest: only input `index` exposes the locking hash it claims.
fn signing_digest(trimmed: &mut Transaction, index: usize, prev_output: &TxOutput) -> Result<Hash256> {
    trimmed.inputs[index].pub_key = prev_output.locking_hash.as_bytes().to_vec();
    let digest = trimmed.compute_id();
    trimmed.inputs[index].pub_key.clear();
    digest
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Transaction {}:", self.id)?;
        for (i, input) in self.inputs.iter().enumerate() {
            writeln!(f, "     Input {}:", i)?;
            match input.prev_tx_id {
                Some(txid) => writeln!(f, "       TXID:      {}", txid)?,
                None => writeln!(f, "       TXID:      (coinbase)")?,
            }
            writeln!(f, "       Out:       {}", input.output_index)?;
            writeln!(f, "       Signature: {}", hex::encode(&input.signature))?;
            writeln!(f, "       PubKey:    {}", hex::encode(&input.pub_key))?;
        }
        for (i, output) in self.outputs.iter().enumerate() {
            writeln!(f, "     Output {}:", i)?;
            writeln!(f, "       Value:  {}", output.value)?;
            write!(f, "       Script: {}", output.locking_hash)?;
            if i + 1 < self.outputs.len() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
