//! # Header
//!
//! The slice of a block that chain selection cares about: height, parent
//! link, timestamp and difficulty. Transactions, receipts and state roots
//! live elsewhere and never influence which fork wins.
//!
//! ## Hash Computation
//!
//! A header's hash is BLAKE3 over a fixed-width, little-endian preimage:
//!
//! ```text
//! number (8) || parent_hash (32) || timestamp (8) || difficulty (16) || nonce (8)
//! ```
//!
//! Fixed-width fields mean no length prefixes and no ambiguity between
//! adjacent fields. The nonce only exists so that two headers with the same
//! parent, time and difficulty can still be distinct blocks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte BLAKE3 digest identifying a header.
pub type Hash = [u8; 32];

/// Per-block difficulty and accumulated total difficulty.
pub type Difficulty = u128;

const HASH_PREIMAGE_LEN: usize = 8 + 32 + 8 + 16 + 8;

/// A block header as seen by the chain-selection engine.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub number: u64,
    pub hash: Hash,
    pub parent_hash: Hash,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub difficulty: Difficulty,
    pub nonce: u64,
}

impl Header {
    /// Build the child of `parent` and seal it with its hash.
    pub fn new(parent: &Header, timestamp: u64, difficulty: Difficulty, nonce: u64) -> Self {
        Self::seal(parent.number + 1, parent.hash, timestamp, difficulty, nonce)
    }

    /// Build a genesis header (height 0, zero parent hash).
    pub fn genesis(timestamp: u64, difficulty: Difficulty) -> Self {
        Self::seal(0, [0u8; 32], timestamp, difficulty, 0)
    }

    fn seal(number: u64, parent_hash: Hash, timestamp: u64, difficulty: Difficulty, nonce: u64) -> Self {
        let mut header = Self {
            number,
            hash: [0u8; 32],
            parent_hash,
            timestamp,
            difficulty,
            nonce,
        };
        header.hash = header.compute_hash();
        header
    }

    /// Recompute the hash from the header's fields.
    pub fn compute_hash(&self) -> Hash {
        let mut preimage = [0u8; HASH_PREIMAGE_LEN];
        preimage[0..8].copy_from_slice(&self.number.to_le_bytes());
        preimage[8..40].copy_from_slice(&self.parent_hash);
        preimage[40..48].copy_from_slice(&self.timestamp.to_le_bytes());
        preimage[48..64].copy_from_slice(&self.difficulty.to_le_bytes());
        preimage[64..72].copy_from_slice(&self.nonce.to_le_bytes());
        *blake3::hash(&preimage).as_bytes()
    }

    /// `true` if the stored hash matches the header's fields.
    pub fn verify_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.number == 0
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// First four bytes of a hash as hex, for log lines.
pub fn short_hash(hash: &Hash) -> String {
    hex::encode(&hash[..4])
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("number", &self.number)
            .field("hash", &short_hash(&self.hash))
            .field("parent", &short_hash(&self.parent_hash))
            .field("timestamp", &self.timestamp)
            .field("difficulty", &self.difficulty)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
