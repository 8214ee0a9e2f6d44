pub mod assembler;
pub mod miner;

pub use assembler::{block_reward, build_coinbase, select_transactions, MAX_BLOCK_SIZE};
pub use miner::{Miner, MiningStats};
