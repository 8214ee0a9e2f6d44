//! Core chain components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (UTXO model with canonical id derivation)
//! - Blocks (header hashing and structural validation)
//! - The UTXO ledger (apply/revert with undo data)
//! - The chain manager (canonical chain ownership, atomic append)
//! - The spend-authorization seam (script verifier trait)

pub mod block;
pub mod chain;
pub mod script;
pub mod transaction;
pub mod utxo;

pub use block::{Block, BlockError, GENESIS_PREV_HASH};
pub use chain::{ChainError, ChainManager, ChainObserver, ChainSnapshot};
pub use script::{ExactMatchVerifier, ScriptVerifier};
pub use transaction::{OutPoint, Transaction, TxInput, TxOutput};
pub use utxo::{LedgerError, TxUndo, UtxoLedger};
