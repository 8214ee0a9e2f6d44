//! Consensus rules: proof of work, difficulty retargeting and fork
//! resolution.

pub mod difficulty;
pub mod fork;
pub mod pow;

pub use difficulty::{next_difficulty, EPOCH_BLOCKS, MIN_DIFFICULTY, TARGET_BLOCK_SECS};
pub use fork::{
    chain_work, reattach_orphans, reorganize, select_heaviest, ForkError, OrphanPool,
    ReorgOutcome, MAX_ORPHAN_BLOCKS,
};
pub use pow::{meets_target, search, CancelToken};
