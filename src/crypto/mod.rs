//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 hashing and the difficulty target check
//! - Length-prefixed preimage encoding for hash inputs
//! - Merkle root calculation

pub mod hash;
pub mod merkle;

pub use hash::{
    double_sha256, double_sha256_hex, meets_difficulty, sha256, sha256_hex, Preimage, HASH_BITS,
};
pub use merkle::merkle_root;
