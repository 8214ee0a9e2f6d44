//! Mining worker: builds a block candidate from a chain snapshot and runs
//! the proof-of-work search over it.
//!
//! The worker never touches the chain manager directly. It consumes an
//! owned [`ChainSnapshot`] plus cloned mempool/ledger views, so the
//! CPU-bound search holds no lock; the caller appends the result under the
//! manager's exclusive section and simply discards it when a competing
//! block won the height in the meantime (by cancelling the token).

use crate::consensus::pow::{search, CancelToken};
use crate::core::block::Block;
use crate::core::chain::ChainSnapshot;
use crate::core::transaction::Transaction;
use crate::core::utxo::UtxoLedger;
use crate::mining::assembler::{build_coinbase, select_transactions, MAX_BLOCK_SIZE};
use log::info;
use std::time::Instant;

/// Outcome counters for one mining run
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of nonces tried
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hashes per second
    pub hash_rate: f64,
}

/// A mining worker paying rewards to one address
pub struct Miner {
    pub address: String,
}

impl Miner {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
        }
    }

    /// Assemble an unmined block on top of the snapshot tip: coinbase
    /// first, then fee-ranked mempool transactions within the size budget.
    pub fn build_candidate(
        &self,
        snapshot: &ChainSnapshot,
        mempool: &[Transaction],
        ledger: &UtxoLedger,
    ) -> Block {
        let height = snapshot.height + 1;

        let mut transactions = vec![build_coinbase(&self.address, height)];
        transactions.extend(select_transactions(mempool, ledger, MAX_BLOCK_SIZE));

        Block::new(
            height,
            snapshot.tip_hash.clone(),
            transactions,
            snapshot.difficulty,
        )
    }

    /// Build a candidate and search for its nonce.
    ///
    /// Returns `None` when the token is cancelled first (the candidate
    /// went stale); the caller owns appending the mined block.
    pub fn mine(
        &self,
        snapshot: &ChainSnapshot,
        mempool: &[Transaction],
        ledger: &UtxoLedger,
        cancel: &CancelToken,
    ) -> Option<(Block, MiningStats)> {
        let mut block = self.build_candidate(snapshot, mempool, ledger);

        info!(
            "mining block {} with {} transactions at difficulty {}...",
            block.index,
            block.transactions.len(),
            block.difficulty
        );

        let start = Instant::now();
        let nonce = search(&block, cancel)?;
        block.nonce = nonce;
        block.hash = block.header_hash();

        let attempts = nonce + 1;
        let elapsed = start.elapsed().as_millis();
        let hash_rate = if elapsed > 0 {
            (attempts as f64) / (elapsed as f64 / 1000.0)
        } else {
            attempts as f64
        };

        info!(
            "block {} mined in {}ms ({} attempts, {:.2} H/s)",
            block.index, elapsed, attempts, hash_rate
        );

        Some((
            block,
            MiningStats {
                hash_attempts: attempts,
                time_ms: elapsed,
                hash_rate,
            },
        ))
    }
}
