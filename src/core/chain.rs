//! Chain manager: the canonical chain and the ledger derived from it.
//!
//! The manager exclusively owns both structures; every mutation goes
//! through a `&mut self` method, so a whole block append (or reorg step)
//! is one exclusive critical section and readers never observe a block
//! whose transactions are only partially applied. Multi-threaded callers
//! wrap the manager in `Arc<RwLock<_>>` and hand the miner an owned
//! [`ChainSnapshot`] so the proof-of-work search runs outside the lock.

use crate::consensus::pow;
use crate::core::block::{Block, BlockError};
use crate::core::script::{ExactMatchVerifier, ScriptVerifier};
use crate::core::transaction::Transaction;
use crate::core::utxo::{LedgerError, TxUndo, UtxoLedger};
use log::{error, info};
use thiserror::Error;

/// Per-block outcomes of trying to extend the chain.
///
/// `UnknownParent` is the one non-terminal case: such a block belongs in
/// the orphan pool, since a later block may complete the link.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("parent {prev_hash} is not the current tip")]
    UnknownParent { prev_hash: String },
    #[error("structurally invalid block: {0}")]
    Structural(#[from] BlockError),
    #[error("hash {hash} does not meet the difficulty {difficulty} target")]
    InsufficientWork { hash: String, difficulty: u32 },
    #[error("ledger violation in transaction {tx_id}: {source}")]
    Ledger {
        tx_id: String,
        #[source]
        source: LedgerError,
    },
    #[error("chain corrupt: {0}")]
    Corrupt(String),
}

/// Notification hooks fired after the manager commits a change. The core
/// does not serialize or frame messages; broadcasting accepted blocks and
/// admitted transactions is the transport layer's job.
pub trait ChainObserver {
    fn block_accepted(&self, _block: &Block) {}
    fn transaction_admitted(&self, _tx: &Transaction) {}
}

/// Immutable view of the tip, taken under the lock and then used without
/// it (candidate assembly, proof-of-work search).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSnapshot {
    pub height: u64,
    pub tip_hash: String,
    pub difficulty: u32,
}

/// Owns the canonical chain, the UTXO ledger and the undo data needed to
/// disconnect tip blocks during reorganization.
pub struct ChainManager {
    blocks: Vec<Block>,
    ledger: UtxoLedger,
    undo_stack: Vec<Vec<TxUndo>>,
    verifier: Box<dyn ScriptVerifier + Send + Sync>,
    observers: Vec<Box<dyn ChainObserver + Send + Sync>>,
}

impl ChainManager {
    /// Create a chain holding only the genesis block, with exact-match
    /// spend authorization.
    pub fn new(initial_difficulty: u32) -> Self {
        Self::with_verifier(initial_difficulty, Box::new(ExactMatchVerifier))
    }

    /// Create a chain with a custom spend-authorization collaborator
    pub fn with_verifier(
        initial_difficulty: u32,
        verifier: Box<dyn ScriptVerifier + Send + Sync>,
    ) -> Self {
        let genesis = Block::genesis(initial_difficulty);
        Self {
            blocks: vec![genesis],
            ledger: UtxoLedger::new(),
            undo_stack: vec![Vec::new()],
            verifier,
            observers: Vec::new(),
        }
    }

    /// Register a notification hook
    pub fn add_observer(&mut self, observer: Box<dyn ChainObserver + Send + Sync>) {
        self.observers.push(observer);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn ledger(&self) -> &UtxoLedger {
        &self.ledger
    }

    pub fn tip(&self) -> &Block {
        self.blocks.last().expect("chain always holds genesis")
    }

    pub fn height(&self) -> u64 {
        self.tip().index
    }

    pub fn get_block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash == hash)
    }

    /// Cumulative work: the sum of per-block difficulty along the chain
    pub fn work(&self) -> u64 {
        self.blocks.iter().map(|b| b.difficulty as u64).sum()
    }

    /// Tip view for detached mining
    pub fn snapshot(&self) -> ChainSnapshot {
        let tip = self.tip();
        ChainSnapshot {
            height: tip.index,
            tip_hash: tip.hash.clone(),
            difficulty: crate::consensus::difficulty::next_difficulty(&self.blocks),
        }
    }

    /// Validate a transaction against the current ledger and fire the
    /// admission hook. Mempool admission runs through this so that a
    /// validate-then-apply race cannot admit two spends of one output:
    /// both this and [`append`](Self::append) need the same `&mut`/lock.
    pub fn admit_transaction(&self, tx: &Transaction) -> Result<u64, LedgerError> {
        let fee = self.ledger.validate(tx, self.verifier.as_ref())?;
        for observer in &self.observers {
            observer.transaction_admitted(tx);
        }
        Ok(fee)
    }

    /// Validate a block against the tip and commit it.
    ///
    /// Transactions are applied to the ledger in listed order; if any
    /// fails, the ones already applied are rolled back and the whole block
    /// is rejected, leaving no partial ledger mutation.
    pub fn append(&mut self, block: Block) -> Result<(), ChainError> {
        let tip = self.tip();

        if block.prev_hash != tip.hash {
            return Err(ChainError::UnknownParent {
                prev_hash: block.prev_hash.clone(),
            });
        }

        block.validate_structure(tip)?;

        if !pow::meets_target(&block.hash, block.difficulty) {
            return Err(ChainError::InsufficientWork {
                hash: block.hash.clone(),
                difficulty: block.difficulty,
            });
        }

        let mut undos: Vec<TxUndo> = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            match self.ledger.apply(tx, self.verifier.as_ref()) {
                Ok(undo) => undos.push(undo),
                Err(source) => {
                    // Roll back what this block already applied
                    for (applied_tx, undo) in
                        block.transactions.iter().zip(undos).rev()
                    {
                        if let Err(e) = self.ledger.revert(applied_tx, undo) {
                            error!("rollback of rejected block {} failed: {e}", block.hash);
                            return Err(ChainError::Corrupt(format!(
                                "rollback failed for block {}: {e}",
                                block.hash
                            )));
                        }
                    }
                    return Err(ChainError::Ledger {
                        tx_id: tx.id.clone(),
                        source,
                    });
                }
            }
        }

        info!(
            "accepted block {} at height {} ({} transactions, difficulty {})",
            block.hash,
            block.index,
            block.transactions.len(),
            block.difficulty
        );

        self.undo_stack.push(undos);
        self.blocks.push(block);

        let accepted = self.tip();
        for observer in &self.observers {
            observer.block_accepted(accepted);
        }
        Ok(())
    }

    /// Disconnect the tip block, reverting its transactions in reverse
    /// order. Used by reorganization; the genesis block cannot be popped.
    pub(crate) fn pop_tip(&mut self) -> Result<Block, ChainError> {
        if self.blocks.len() == 1 {
            return Err(ChainError::Corrupt(
                "cannot disconnect the genesis block".to_string(),
            ));
        }

        let block = self.blocks.pop().expect("checked above");
        let undos = self.undo_stack.pop().expect("undo stack tracks blocks");

        for (tx, undo) in block.transactions.iter().zip(undos).rev() {
            if let Err(e) = self.ledger.revert(tx, undo) {
                error!("disconnect of block {} failed: {e}", block.hash);
                return Err(ChainError::Corrupt(format!(
                    "disconnect failed for block {}: {e}",
                    block.hash
                )));
            }
        }

        Ok(block)
    }

    /// Rebuild the ledger by replaying every transaction from genesis.
    ///
    /// This is the authoritative recovery procedure after a restart: the
    /// ledger must always equal the fold of the canonical chain's
    /// transactions, which [`Self::verify_ledger`] checks.
    pub fn rebuild_ledger(&self) -> Result<UtxoLedger, ChainError> {
        let mut ledger = UtxoLedger::new();
        for block in &self.blocks {
            for tx in &block.transactions {
                ledger
                    .apply(tx, self.verifier.as_ref())
                    .map_err(|e| {
                        ChainError::Corrupt(format!(
                            "replay failed at block {} tx {}: {e}",
                            block.hash, tx.id
                        ))
                    })?;
            }
        }
        Ok(ledger)
    }

    /// Check that the incrementally maintained ledger equals a fresh
    /// replay of the chain
    pub fn verify_ledger(&self) -> Result<(), ChainError> {
        let replayed = self.rebuild_ledger()?;
        if replayed != self.ledger {
            error!("ledger diverged from chain replay");
            return Err(ChainError::Corrupt(
                "ledger does not equal the replay of the canonical chain".to_string(),
            ));
        }
        Ok(())
    }
}
