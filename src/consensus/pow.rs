//! Proof-of-work: target check and cancelable nonce search.

use crate::core::block::Block;
use crate::crypto::meets_difficulty;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How many nonces the search tries between cancellation polls
const CANCEL_POLL_STRIDE: u64 = 1024;

/// Cooperative cancellation handle for an in-flight search.
///
/// Cheap to clone; the canceling side keeps one clone and the search polls
/// another. A search whose block became stale (a competitor was accepted at
/// the same height) is cancelled and its result discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Does the hash satisfy the target `2^(HASH_BITS - difficulty)`?
///
/// The hash is read as a big-endian unsigned integer; it is below the
/// target exactly when its top `difficulty` bits are zero.
pub fn meets_target(hash_hex: &str, difficulty: u32) -> bool {
    match hex::decode(hash_hex) {
        Ok(bytes) => meets_difficulty(&bytes, difficulty),
        Err(_) => false,
    }
}

/// Search for a nonce whose header hash meets the block's difficulty
/// target, counting up from zero.
///
/// Returns `None` when the token is cancelled before a nonce is found.
/// The block itself is untouched; the caller assigns the returned nonce
/// and recomputes the stored hash. This is the one unbounded CPU-bound
/// operation in the crate and it must never run under a ledger lock:
/// callers hand it a candidate built from an owned snapshot.
pub fn search(block: &Block, cancel: &CancelToken) -> Option<u64> {
    let mut nonce: u64 = 0;
    loop {
        if nonce % CANCEL_POLL_STRIDE == 0 && cancel.is_cancelled() {
            return None;
        }
        if meets_target(&block.header_hash_with_nonce(nonce), block.difficulty) {
            return Some(nonce);
        }
        nonce = nonce.wrapping_add(1);
    }
}
