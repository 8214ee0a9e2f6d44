//! UTXO-model transactions.
//!
//! A transaction consumes previous outputs through its inputs and creates
//! new outputs. Its id is a SHA-256 over a length-prefixed canonical
//! encoding of inputs and outputs, so differently-split fields can never
//! collide.

use crate::crypto::{Preimage, sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A spendable output: a value locked by an opaque script
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxOutput {
    /// Amount of coins
    pub value: u64,
    /// Locking script (an address under exact-match authorization)
    pub script_pubkey: String,
}

impl TxOutput {
    pub fn new(value: u64, script_pubkey: &str) -> Self {
        Self {
            value,
            script_pubkey: script_pubkey.to_string(),
        }
    }

    /// Check if this output is locked to the given script
    pub fn is_locked_by(&self, script_pubkey: &str) -> bool {
        self.script_pubkey == script_pubkey
    }
}

/// Reference to a previous output plus the unlock script that spends it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxInput {
    /// Id of the transaction that created the output being spent
    pub prev_tx_id: String,
    /// Index of that output in its transaction
    pub output_index: u32,
    /// Unlock script proving spend authorization
    pub script_sig: String,
}

impl TxInput {
    pub fn new(prev_tx_id: &str, output_index: u32, script_sig: &str) -> Self {
        Self {
            prev_tx_id: prev_tx_id.to_string(),
            output_index,
            script_sig: script_sig.to_string(),
        }
    }

    /// The ledger key this input consumes
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            tx_id: self.prev_tx_id.clone(),
            index: self.output_index,
        }
    }
}

/// Ledger key of a single transaction output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub tx_id: String,
    pub index: u32,
}

impl OutPoint {
    pub fn new(tx_id: &str, index: u32) -> Self {
        Self {
            tx_id: tx_id.to_string(),
            index,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

/// A transaction: ordered inputs consuming prior outputs, ordered outputs
/// creating new ones. Immutable once the id is assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// Content hash over inputs and outputs
    pub id: String,
    /// Inputs, empty for coinbase transactions
    pub inputs: Vec<TxInput>,
    /// Outputs
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Create a transaction and derive its id
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: String::new(),
            inputs,
            outputs,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Create a coinbase (mining reward) transaction: zero inputs, one
    /// output paying `reward` to `recipient`.
    ///
    /// The id is synthesized from the block height and the payout so that
    /// coinbases at different heights never share an id.
    pub fn coinbase(recipient: &str, reward: u64, height: u64) -> Self {
        let mut preimage = Preimage::new();
        preimage.push_str("coinbase");
        preimage.push_u64(height);
        preimage.push_u64(reward);
        preimage.push_str(recipient);

        Self {
            id: preimage.sha256_hex(),
            inputs: Vec::new(),
            outputs: vec![TxOutput::new(reward, recipient)],
        }
    }

    /// A coinbase transaction has no inputs
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Canonical content hash over inputs and outputs
    pub fn compute_id(&self) -> String {
        let mut preimage = Preimage::new();

        preimage.push_u64(self.inputs.len() as u64);
        for input in &self.inputs {
            preimage.push_str(&input.prev_tx_id);
            preimage.push_u32(input.output_index);
            preimage.push_str(&input.script_sig);
        }

        preimage.push_u64(self.outputs.len() as u64);
        for output in &self.outputs {
            preimage.push_u64(output.value);
            preimage.push_str(&output.script_pubkey);
        }

        preimage.sha256_hex()
    }

    /// Message bytes handed to the spend-authorization collaborator.
    ///
    /// Covers the consumed outpoints and the outputs but not the unlock
    /// scripts themselves, so a signature cannot depend on its own bytes.
    pub fn signing_context(&self) -> Vec<u8> {
        let mut preimage = Preimage::new();

        preimage.push_u64(self.inputs.len() as u64);
        for input in &self.inputs {
            preimage.push_str(&input.prev_tx_id);
            preimage.push_u32(input.output_index);
        }

        preimage.push_u64(self.outputs.len() as u64);
        for output in &self.outputs {
            preimage.push_u64(output.value);
            preimage.push_str(&output.script_pubkey);
        }

        sha256(preimage.bytes())
    }

    /// Sum of all output values, `None` when the sum overflows `u64`
    pub fn total_output(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
    }

    /// Serialized-size estimate used for block size budgeting
    pub fn estimated_size(&self) -> usize {
        self.id.len() + self.inputs.len() * 100 + self.outputs.len() * 100
    }
}
