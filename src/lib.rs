//! An in-memory proof-of-work blockchain with a UTXO ledger.
//!
//! Blocks carry fee-ranked transactions under a Merkle root, the ledger
//! applies and reverts them as exact inverses, and forks resolve to the
//! chain with the most cumulative work.
//!
//! ```
//! use utxo_chain::consensus::pow::CancelToken;
//! use utxo_chain::core::chain::ChainManager;
//! use utxo_chain::mining::Miner;
//!
//! let mut chain = ChainManager::new(1);
//! let miner = Miner::new("alice");
//!
//! let snapshot = chain.snapshot();
//! let (block, _stats) = miner
//!     .mine(&snapshot, &[], chain.ledger(), &CancelToken::new())
//!     .unwrap();
//! chain.append(block).unwrap();
//!
//! assert_eq!(chain.height(), 1);
//! assert_eq!(chain.ledger().balance("alice"), 50);
//! ```

pub mod consensus;
pub mod core;
pub mod crypto;
pub mod mining;

pub use crate::core::block::Block;
pub use crate::core::chain::{ChainError, ChainManager};
pub use crate::core::transaction::{Transaction, TxInput, TxOutput};
pub use crate::core::utxo::UtxoLedger;
pub use crate::mining::Miner;
