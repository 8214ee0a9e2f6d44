//! Merkle root computation over transaction ids.
//!
//! The root commits to an ordered list of transaction ids: swapping two
//! distinct ids changes the root, so transaction order inside a block is
//! part of its identity.

use super::hash::sha256_hex;

/// Calculate the merkle root from an ordered list of hex-encoded ids.
///
/// Adjacent pairs are concatenated left-to-right and hashed; when a level
/// has an odd count, the last id is carried up to the next level unchanged
/// (not paired with itself). A single id is its own root. The reduction is
/// iterative, so arbitrarily long transaction lists cannot overflow the
/// stack.
///
/// An empty list is the caller's error; block validation rejects empty
/// transaction lists before this is ever reached. The function stays total
/// by returning the hash of the empty string.
pub fn merkle_root(ids: &[String]) -> String {
    if ids.is_empty() {
        return sha256_hex(b"");
    }

    let mut level: Vec<String> = ids.to_vec();

    while level.len() > 1 {
        let mut next_level = Vec::with_capacity(level.len() / 2 + 1);

        for chunk in level.chunks(2) {
            if chunk.len() == 2 {
                let mut combined = chunk[0].clone();
                combined.push_str(&chunk[1]);
                next_level.push(sha256_hex(combined.as_bytes()));
            } else {
                // Odd leftover: carry it up unchanged
                next_level.push(chunk[0].clone());
            }
        }

        level = next_level;
    }

    level.remove(0)
}
