//! Block model: header hashing and structural validation.

use crate::core::transaction::Transaction;
use crate::crypto::{merkle_root, Preimage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Previous-hash value of the genesis block
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Structural block defects. Proof-of-work sufficiency and ledger legality
/// are diagnosed separately by the consensus and ledger layers.
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("non-sequential index: expected {expected}, got {got}")]
    NonSequentialIndex { expected: u64, got: u64 },
    #[error("previous hash does not match parent block")]
    BrokenLinkage,
    #[error("block has no transactions")]
    EmptyTransactions,
    #[error("merkle root does not commit to the transaction list")]
    MerkleMismatch,
    #[error("stored hash does not match the header")]
    HashMismatch,
}

/// A block in the chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Height of this block, genesis is 0
    pub index: u64,
    /// Hash of the previous block
    pub prev_hash: String,
    /// Block creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Ordered transaction list, coinbase first
    pub transactions: Vec<Transaction>,
    /// Merkle root over the transaction ids
    pub merkle_root: String,
    /// Proof-of-work nonce
    pub nonce: u64,
    /// Header hash (cached; recomputed during validation)
    pub hash: String,
    /// Difficulty this block was mined at
    pub difficulty: u32,
}

impl Block {
    /// Create an unmined block on top of the given parent hash.
    /// The nonce is zero and the hash is not yet a valid proof of work.
    pub fn new(
        index: u64,
        prev_hash: String,
        transactions: Vec<Transaction>,
        difficulty: u32,
    ) -> Self {
        let ids: Vec<String> = transactions.iter().map(|tx| tx.id.clone()).collect();
        let merkle_root = merkle_root(&ids);

        let mut block = Self {
            index,
            prev_hash,
            timestamp: Utc::now(),
            transactions,
            merkle_root,
            nonce: 0,
            hash: String::new(),
            difficulty,
        };
        block.hash = block.header_hash();
        block
    }

    /// The genesis block: index 0, no transactions, no proof-of-work
    /// requirement. `difficulty` seeds the chain's difficulty schedule.
    pub fn genesis(difficulty: u32) -> Self {
        Self::new(0, GENESIS_PREV_HASH.to_string(), Vec::new(), difficulty)
    }

    /// Header hash over (index, prev_hash, timestamp, merkle_root, nonce).
    /// Fields are length-prefixed or fixed-width, so no two distinct
    /// headers share a preimage.
    pub fn header_hash(&self) -> String {
        self.header_hash_with_nonce(self.nonce)
    }

    /// Header hash with a candidate nonce, used by the proof-of-work search
    pub fn header_hash_with_nonce(&self, nonce: u64) -> String {
        let mut preimage = Preimage::new();
        preimage.push_u64(self.index);
        preimage.push_str(&self.prev_hash);
        preimage.push_i64(self.timestamp.timestamp());
        preimage.push_str(&self.merkle_root);
        preimage.push_u64(nonce);
        preimage.double_sha256_hex()
    }

    /// Recompute the merkle root and compare against the stored one
    pub fn verify_merkle_root(&self) -> bool {
        let ids: Vec<String> = self.transactions.iter().map(|tx| tx.id.clone()).collect();
        merkle_root(&ids) == self.merkle_root
    }

    /// Structural validation against the parent block.
    ///
    /// Checks linkage, the merkle commitment and the stored header hash.
    /// The proof-of-work target and transaction legality are checked by
    /// the consensus and ledger layers.
    pub fn validate_structure(&self, prev: &Block) -> Result<(), BlockError> {
        if self.index != prev.index + 1 {
            return Err(BlockError::NonSequentialIndex {
                expected: prev.index + 1,
                got: self.index,
            });
        }
        if self.prev_hash != prev.hash {
            return Err(BlockError::BrokenLinkage);
        }
        if self.transactions.is_empty() {
            return Err(BlockError::EmptyTransactions);
        }
        if !self.verify_merkle_root() {
            return Err(BlockError::MerkleMismatch);
        }
        if self.header_hash() != self.hash {
            return Err(BlockError::HashMismatch);
        }
        Ok(())
    }

    /// Coinbase transaction, when present as the first transaction
    pub fn coinbase_tx(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    /// Serialized-size estimate of the whole transaction list
    pub fn estimated_size(&self) -> usize {
        self.transactions.iter().map(|tx| tx.estimated_size()).sum()
    }
}
