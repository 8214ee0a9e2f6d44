//! The UTXO ledger: every spendable output on the canonical chain.
//!
//! The ledger is owned by the chain manager and mutated only through
//! [`UtxoLedger::apply`] and [`UtxoLedger::revert`], which are exact
//! inverses of each other. An entry exists iff the referenced output has
//! been created and not yet spent.

use crate::core::script::ScriptVerifier;
use crate::core::transaction::{OutPoint, Transaction, TxOutput};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Per-transaction ledger violations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("spend of unknown output {0} (already spent or never existed)")]
    SpendOfUnknownOutput(OutPoint),
    #[error("outputs ({outputs}) exceed inputs ({inputs})")]
    Unbalanced { inputs: u64, outputs: u64 },
    #[error("unlock script does not authorize spending {0}")]
    UnauthorizedSpend(OutPoint),
    #[error("ledger inconsistency: {0}")]
    Inconsistent(String),
}

/// Undo record returned by [`UtxoLedger::apply`]: the outputs a transaction
/// consumed, needed to restore them on revert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxUndo {
    pub spent: Vec<(OutPoint, TxOutput)>,
}

/// Set of unspent transaction outputs, keyed by `(tx_id, output_index)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoLedger {
    entries: HashMap<OutPoint, TxOutput>,
}

impl UtxoLedger {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.entries.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all unspent outputs
    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &TxOutput)> {
        self.entries.iter()
    }

    /// Total value locked to the given script
    pub fn balance(&self, script_pubkey: &str) -> u64 {
        self.entries
            .values()
            .filter(|out| out.is_locked_by(script_pubkey))
            .map(|out| out.value)
            .sum()
    }

    /// Validate a transaction against the current ledger without mutating
    /// it. Returns the implicit fee (inputs minus outputs).
    ///
    /// Coinbase transactions skip the input checks and carry no fee.
    pub fn validate(
        &self,
        tx: &Transaction,
        verifier: &dyn ScriptVerifier,
    ) -> Result<u64, LedgerError> {
        if tx.is_coinbase() {
            return Ok(0);
        }

        let context = tx.signing_context();
        let mut seen: HashSet<OutPoint> = HashSet::new();
        let mut input_sum: u64 = 0;

        for input in &tx.inputs {
            let outpoint = input.outpoint();

            // A second spend of the same outpoint inside one transaction
            // is a spend of an already-consumed output.
            if !seen.insert(outpoint.clone()) {
                return Err(LedgerError::SpendOfUnknownOutput(outpoint));
            }

            let output = self
                .entries
                .get(&outpoint)
                .ok_or_else(|| LedgerError::SpendOfUnknownOutput(outpoint.clone()))?;

            if !verifier.verify(&output.script_pubkey, &input.script_sig, &context) {
                return Err(LedgerError::UnauthorizedSpend(outpoint));
            }

            // Value sums past u64::MAX are rejected rather than wrapped;
            // the error carries saturated figures.
            input_sum = input_sum.checked_add(output.value).ok_or_else(|| {
                LedgerError::Unbalanced {
                    inputs: u64::MAX,
                    outputs: tx.total_output().unwrap_or(u64::MAX),
                }
            })?;
        }

        let output_sum = tx.total_output().ok_or(LedgerError::Unbalanced {
            inputs: input_sum,
            outputs: u64::MAX,
        })?;
        if output_sum > input_sum {
            return Err(LedgerError::Unbalanced {
                inputs: input_sum,
                outputs: output_sum,
            });
        }

        // The non-negative difference is the fee, kept by the miner
        Ok(input_sum - output_sum)
    }

    /// Apply a transaction: remove every consumed entry and insert one
    /// entry per output. All-or-nothing; on error the ledger is untouched.
    ///
    /// Returns the undo record required to [`revert`](Self::revert).
    pub fn apply(
        &mut self,
        tx: &Transaction,
        verifier: &dyn ScriptVerifier,
    ) -> Result<TxUndo, LedgerError> {
        // Validation performs every fallible check up front, so the
        // mutations below cannot fail halfway.
        self.validate(tx, verifier)?;

        let mut undo = TxUndo::default();

        for input in &tx.inputs {
            let outpoint = input.outpoint();
            let output = self
                .entries
                .remove(&outpoint)
                .ok_or_else(|| LedgerError::SpendOfUnknownOutput(outpoint.clone()))?;
            undo.spent.push((outpoint, output));
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            self.entries
                .insert(OutPoint::new(&tx.id, index as u32), output.clone());
        }

        Ok(undo)
    }

    /// Exact inverse of [`apply`](Self::apply): remove the transaction's
    /// outputs and restore the outputs it consumed.
    ///
    /// Failure here means apply and revert have diverged, which is a
    /// programming defect rather than a per-transaction outcome; the error
    /// is logged loudly and surfaced as [`LedgerError::Inconsistent`].
    pub fn revert(&mut self, tx: &Transaction, undo: TxUndo) -> Result<(), LedgerError> {
        for (index, _) in tx.outputs.iter().enumerate() {
            let outpoint = OutPoint::new(&tx.id, index as u32);
            if self.entries.remove(&outpoint).is_none() {
                log::error!("revert of {}: output {outpoint} missing from ledger", tx.id);
                return Err(LedgerError::Inconsistent(format!(
                    "output {outpoint} missing during revert"
                )));
            }
        }

        for (outpoint, output) in undo.spent {
            if self.entries.insert(outpoint.clone(), output).is_some() {
                log::error!("revert of {}: outpoint {outpoint} was never spent", tx.id);
                return Err(LedgerError::Inconsistent(format!(
                    "outpoint {outpoint} already unspent during revert"
                )));
            }
        }

        Ok(())
    }

    /// Fee of a transaction under the current ledger, or `None` when any
    /// input is unresolvable, a value sum overflows, or outputs exceed
    /// inputs. Used by the block
    /// assembler, which excludes unresolvable transactions rather than
    /// treating them as zero-fee.
    pub fn resolve_fee(&self, tx: &Transaction) -> Option<u64> {
        if tx.is_coinbase() {
            return None;
        }

        let mut input_sum: u64 = 0;
        for input in &tx.inputs {
            let value = self.entries.get(&input.outpoint()).map(|o| o.value)?;
            input_sum = input_sum.checked_add(value)?;
        }

        input_sum.checked_sub(tx.total_output()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::ExactMatchVerifier;
    use crate::core::transaction::TxInput;

    fn ledger_with_coinbase() -> (UtxoLedger, Transaction) {
        let mut ledger = UtxoLedger::new();
        let coinbase = Transaction::coinbase("alice", 50, 1);
        ledger.apply(&coinbase, &ExactMatchVerifier).unwrap();
        (ledger, coinbase)
    }

    #[test]
    fn test_apply_coinbase() {
        let (ledger, coinbase) = ledger_with_coinbase();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.balance("alice"), 50);
        assert!(ledger.contains(&OutPoint::new(&coinbase.id, 0)));
    }

    #[test]
    fn test_apply_spend() {
        let (mut ledger, coinbase) = ledger_with_coinbase();

        let spend = Transaction::new(
            vec![TxInput::new(&coinbase.id, 0, "alice")],
            vec![TxOutput::new(30, "bob"), TxOutput::new(20, "carol")],
        );
        ledger.apply(&spend, &ExactMatchVerifier).unwrap();

        assert_eq!(ledger.len(), 2);
        assert!(!ledger.contains(&OutPoint::new(&coinbase.id, 0)));
        assert_eq!(ledger.balance("bob"), 30);
        assert_eq!(ledger.balance("carol"), 20);
        assert_eq!(ledger.balance("alice"), 0);
    }

    #[test]
    fn test_revert_restores_prior_state() {
        let (mut ledger, coinbase) = ledger_with_coinbase();
        let before = ledger.clone();

        let spend = Transaction::new(
            vec![TxInput::new(&coinbase.id, 0, "alice")],
            vec![TxOutput::new(49, "bob")],
        );
        let undo = ledger.apply(&spend, &ExactMatchVerifier).unwrap();
        assert_ne!(ledger, before);

        ledger.revert(&spend, undo).unwrap();
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_revert_coinbase() {
        let mut ledger = UtxoLedger::new();
        let before = ledger.clone();

        let coinbase = Transaction::coinbase("alice", 50, 1);
        let undo = ledger.apply(&coinbase, &ExactMatchVerifier).unwrap();

        ledger.revert(&coinbase, undo).unwrap();
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_spend_unknown_output() {
        let mut ledger = UtxoLedger::new();
        let spend = Transaction::new(
            vec![TxInput::new("missing", 0, "alice")],
            vec![TxOutput::new(1, "bob")],
        );

        assert!(matches!(
            ledger.apply(&spend, &ExactMatchVerifier),
            Err(LedgerError::SpendOfUnknownOutput(_))
        ));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_unbalanced() {
        let (mut ledger, coinbase) = ledger_with_coinbase();
        let before = ledger.clone();

        let spend = Transaction::new(
            vec![TxInput::new(&coinbase.id, 0, "alice")],
            vec![TxOutput::new(60, "bob")],
        );

        assert!(matches!(
            ledger.apply(&spend, &ExactMatchVerifier),
            Err(LedgerError::Unbalanced {
                inputs: 50,
                outputs: 60
            })
        ));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_unauthorized_spend() {
        let (mut ledger, coinbase) = ledger_with_coinbase();

        let spend = Transaction::new(
            vec![TxInput::new(&coinbase.id, 0, "mallory")],
            vec![TxOutput::new(50, "mallory")],
        );

        assert!(matches!(
            ledger.apply(&spend, &ExactMatchVerifier),
            Err(LedgerError::UnauthorizedSpend(_))
        ));
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let (mut ledger, coinbase) = ledger_with_coinbase();

        let spend = Transaction::new(
            vec![
                TxInput::new(&coinbase.id, 0, "alice"),
                TxInput::new(&coinbase.id, 0, "alice"),
            ],
            vec![TxOutput::new(100, "bob")],
        );

        assert!(matches!(
            ledger.apply(&spend, &ExactMatchVerifier),
            Err(LedgerError::SpendOfUnknownOutput(_))
        ));
    }

    #[test]
    fn test_input_sum_overflow_rejected() {
        // Two maximum-value outputs whose sum exceeds u64: spending both
        // must be rejected, not wrap around to a tiny balance.
        let mut ledger = UtxoLedger::new();
        let cb1 = Transaction::coinbase("alice", u64::MAX, 1);
        let cb2 = Transaction::coinbase("alice", u64::MAX, 2);
        ledger.apply(&cb1, &ExactMatchVerifier).unwrap();
        ledger.apply(&cb2, &ExactMatchVerifier).unwrap();

        let spend = Transaction::new(
            vec![
                TxInput::new(&cb1.id, 0, "alice"),
                TxInput::new(&cb2.id, 0, "alice"),
            ],
            vec![TxOutput::new(1, "bob")],
        );

        assert!(matches!(
            ledger.validate(&spend, &ExactMatchVerifier),
            Err(LedgerError::Unbalanced { .. })
        ));
        assert_eq!(ledger.resolve_fee(&spend), None);
    }

    #[test]
    fn test_output_sum_overflow_rejected() {
        let (ledger, coinbase) = ledger_with_coinbase();

        let spend = Transaction::new(
            vec![TxInput::new(&coinbase.id, 0, "alice")],
            vec![TxOutput::new(u64::MAX, "bob"), TxOutput::new(1, "carol")],
        );

        assert!(matches!(
            ledger.validate(&spend, &ExactMatchVerifier),
            Err(LedgerError::Unbalanced { .. })
        ));
        assert_eq!(ledger.resolve_fee(&spend), None);
    }

    #[test]
    fn test_fee_is_implicit() {
        let (mut ledger, coinbase) = ledger_with_coinbase();

        let spend = Transaction::new(
            vec![TxInput::new(&coinbase.id, 0, "alice")],
            vec![TxOutput::new(45, "bob")],
        );
        let fee = ledger.validate(&spend, &ExactMatchVerifier).unwrap();
        assert_eq!(fee, 5);

        ledger.apply(&spend, &ExactMatchVerifier).unwrap();
        // The fee is not returned to anyone; total supply visible in the
        // ledger shrinks until a coinbase collects it.
        assert_eq!(ledger.balance("bob"), 45);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_resolve_fee() {
        let (ledger, coinbase) = ledger_with_coinbase();

        let spend = Transaction::new(
            vec![TxInput::new(&coinbase.id, 0, "alice")],
            vec![TxOutput::new(40, "bob")],
        );
        assert_eq!(ledger.resolve_fee(&spend), Some(10));

        let unresolvable = Transaction::new(
            vec![TxInput::new("missing", 0, "alice")],
            vec![TxOutput::new(1, "bob")],
        );
        assert_eq!(ledger.resolve_fee(&unresolvable), None);

        let overdrawn = Transaction::new(
            vec![TxInput::new(&coinbase.id, 0, "alice")],
            vec![TxOutput::new(60, "bob")],
        );
        assert_eq!(ledger.resolve_fee(&overdrawn), None);
    }
}
