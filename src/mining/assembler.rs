//! Block assembly: reward schedule, coinbase construction and fee-ordered
//! transaction selection.

use crate::core::transaction::Transaction;
use crate::core::utxo::UtxoLedger;

/// Reward paid by the first block
pub const INITIAL_REWARD: u64 = 50;

/// Number of blocks between reward halvings
pub const HALVING_INTERVAL: u64 = 210_000;

/// Default block size budget in bytes
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// Mining reward at the given height: the initial reward halved once per
/// completed interval, reaching zero once shifted past its bit width.
pub fn block_reward(height: u64) -> u64 {
    let halvings = height / HALVING_INTERVAL;
    if halvings >= u64::BITS as u64 {
        return 0;
    }
    INITIAL_REWARD >> halvings
}

/// The reward-granting transaction for a block at `height`, paying the
/// miner. Callers prepend it as the block's first transaction.
pub fn build_coinbase(miner_address: &str, height: u64) -> Transaction {
    Transaction::coinbase(miner_address, block_reward(height), height)
}

/// Select mempool transactions for a block candidate.
///
/// Transactions are ranked by descending fee, looked up against the
/// current ledger; one whose inputs are not resolvable is excluded rather
/// than treated as zero-fee. Admission is greedy in rank order while the
/// running size estimate stays within `max_block_size`, and stops entirely
/// at the first transaction that would overflow the budget.
pub fn select_transactions(
    mempool: &[Transaction],
    ledger: &UtxoLedger,
    max_block_size: usize,
) -> Vec<Transaction> {
    let mut ranked: Vec<(u64, &Transaction)> = mempool
        .iter()
        .filter_map(|tx| ledger.resolve_fee(tx).map(|fee| (fee, tx)))
        .collect();
    // Stable sort keeps arrival order among equal fees
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let mut selected = Vec::new();
    let mut current_size = 0usize;

    for (_fee, tx) in ranked {
        let tx_size = tx.estimated_size();
        if current_size + tx_size > max_block_size {
            break;
        }
        selected.push(tx.clone());
        current_size += tx_size;
    }

    selected
}
