//! SHA-256 hashing utilities.
//!
//! Provides the hash functions used for block hashes, transaction ids and
//! merkle computation, plus the difficulty target check and a small
//! length-prefixed preimage encoder that keeps hash inputs unambiguous.

use sha2::{Digest, Sha256};

/// Number of bits in a block hash. The proof-of-work target for difficulty
/// `d` is `2^(HASH_BITS - d)`.
pub const HASH_BITS: u32 = 256;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
/// Used for block header hashes
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Computes double SHA-256 hash and returns it as a hex string
pub fn double_sha256_hex(data: &[u8]) -> String {
    hex::encode(double_sha256(data))
}

/// Checks whether a hash, read as a big-endian 256-bit integer, is below
/// the target `2^(HASH_BITS - difficulty)`.
///
/// That comparison holds exactly when the hash's top `difficulty` bits are
/// all zero, so this checks leading zero bits instead of doing big-integer
/// arithmetic.
pub fn meets_difficulty(hash: &[u8], difficulty: u32) -> bool {
    let full_bytes = difficulty as usize / 8;
    let remaining_bits = difficulty as usize % 8;

    if full_bytes > hash.len() {
        return false;
    }

    for byte in hash.iter().take(full_bytes) {
        if *byte != 0 {
            return false;
        }
    }

    if remaining_bits > 0 {
        if full_bytes >= hash.len() {
            return false;
        }
        let mask = 0xFFu8 << (8 - remaining_bits);
        if hash[full_bytes] & mask != 0 {
            return false;
        }
    }

    true
}

/// Length-prefixed preimage builder.
///
/// Every variable-length field is preceded by its byte length and every
/// integer is written fixed-width, so no two distinct field sequences can
/// produce the same byte stream. Used for block header hashes and
/// transaction ids.
#[derive(Debug, Default)]
pub struct Preimage {
    buf: Vec<u8>,
}

impl Preimage {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn push_str(&mut self, s: &str) {
        self.buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn push_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// SHA-256 of the accumulated bytes, hex encoded
    pub fn sha256_hex(&self) -> String {
        sha256_hex(&self.buf)
    }

    /// Double SHA-256 of the accumulated bytes, hex encoded
    pub fn double_sha256_hex(&self) -> String {
        double_sha256_hex(&self.buf)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }
}
