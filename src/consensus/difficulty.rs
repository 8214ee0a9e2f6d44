//! Difficulty retargeting.
//!
//! Every `EPOCH_BLOCKS` blocks the difficulty moves by at most one step,
//! based on how long the epoch actually took. The bounded, slow-moving
//! adjustment avoids oscillation and keeps block production paced
//! regardless of aggregate mining power.

use crate::core::block::Block;
use log::info;

/// Number of blocks between difficulty adjustments
pub const EPOCH_BLOCKS: usize = 10;

/// Target seconds per block
pub const TARGET_BLOCK_SECS: i64 = 10;

/// Difficulty never drops below this
pub const MIN_DIFFICULTY: u32 = 1;

/// Difficulty for the next block on top of `chain`.
///
/// Off an epoch boundary the tip's difficulty carries over unchanged. On a
/// boundary, the epoch's wall-clock duration is compared to the expected
/// one: an epoch finished in under half the expected time raises the
/// difficulty by one, over double lowers it by one (floored at
/// [`MIN_DIFFICULTY`]).
pub fn next_difficulty(chain: &[Block]) -> u32 {
    let tip = match chain.last() {
        Some(tip) => tip,
        None => return MIN_DIFFICULTY,
    };

    if chain.len() % EPOCH_BLOCKS != 0 {
        return tip.difficulty;
    }

    let epoch_start = &chain[chain.len() - EPOCH_BLOCKS];
    let actual_secs = tip
        .timestamp
        .signed_duration_since(epoch_start.timestamp)
        .num_seconds();
    let expected_secs = TARGET_BLOCK_SECS * EPOCH_BLOCKS as i64;

    let next = if actual_secs < expected_secs / 2 {
        tip.difficulty + 1
    } else if actual_secs > expected_secs * 2 {
        tip.difficulty.saturating_sub(1).max(MIN_DIFFICULTY)
    } else {
        tip.difficulty
    };

    if next != tip.difficulty {
        info!(
            "difficulty retarget at height {}: {} -> {next} (epoch took {actual_secs}s, expected {expected_secs}s)",
            tip.index, tip.difficulty
        );
    }

    next
}
