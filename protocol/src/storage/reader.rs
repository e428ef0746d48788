//! Read-side interface of the header and total-difficulty store.
//!
//! The finality components only ever look things up; they never write.
//! Keeping them generic over [`HeaderReader`] lets them run against the sled
//! store, a frozen snapshot, or a test double without caring which.

use super::db::DbResult;
use super::header::{Difficulty, Hash, Header};

pub trait HeaderReader {
    /// Look up any stored header, canonical or not.
    fn header_by_hash(&self, hash: &Hash) -> DbResult<Option<Header>>;

    /// Accumulated difficulty from genesis through the header with `hash`.
    fn total_difficulty(&self, hash: &Hash) -> DbResult<Option<Difficulty>>;

    /// Hash of the canonical header at `number`.
    fn canonical_hash(&self, number: u64) -> DbResult<Option<Hash>>;

    /// The canonical header at `number`.
    fn canonical_header(&self, number: u64) -> DbResult<Option<Header>> {
        match self.canonical_hash(number)? {
            Some(hash) => self.header_by_hash(&hash),
            None => Ok(None),
        }
    }

    /// `true` if `header` is on the canonical chain.
    fn is_canonical(&self, header: &Header) -> DbResult<bool> {
        Ok(self.canonical_hash(header.number)? == Some(header.hash))
    }
}
