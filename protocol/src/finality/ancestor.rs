//! Common-ancestor search.
//!
//! Walks parent links back from a candidate's parent until it lands on a
//! header that is on the canonical chain. Everything walked over on the way
//! is an already-stored side-chain header that becomes canonical too if the
//! candidate wins, so it is returned as the `branch`.

use tracing::trace;

use crate::error::{ChainError, ChainResult};
use crate::storage::{short_hash, Difficulty, Hash, Header, HeaderReader};

/// The most recent canonical header shared with a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonAncestor {
    pub header: Header,
    pub total_difficulty: Difficulty,
    /// Stored non-canonical headers between the ancestor and the candidate's
    /// first new header, lowest first.
    pub branch: Vec<(u64, Hash)>,
}

impl CommonAncestor {
    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn hash(&self) -> Hash {
        self.header.hash
    }
}

/// Find where the chain ending at `parent_hash` meets the canonical chain.
///
/// Fails with [`ChainError::UnknownAncestor`] if a parent link dangles, if
/// the walk reaches a foreign genesis, or if the meeting point would be
/// below `retained_from`.
pub fn find_common_ancestor<R: HeaderReader + ?Sized>(
    reader: &R,
    parent_hash: &Hash,
    retained_from: u64,
) -> ChainResult<CommonAncestor> {
    let unknown = || ChainError::UnknownAncestor {
        hash: *parent_hash,
        retained_from,
    };

    let mut cursor = reader.header_by_hash(parent_hash)?.ok_or_else(unknown)?;
    let mut branch = Vec::new();

    loop {
        if cursor.number < retained_from {
            return Err(unknown());
        }
        if reader.is_canonical(&cursor)? {
            break;
        }
        if cursor.is_genesis() {
            return Err(unknown());
        }
        branch.push((cursor.number, cursor.hash));
        cursor = reader.header_by_hash(&cursor.parent_hash)?.ok_or_else(unknown)?;
    }
    branch.reverse();

    let total_difficulty = reader
        .total_difficulty(&cursor.hash)?
        .ok_or(ChainError::MissingTotalDifficulty { hash: cursor.hash })?;

    trace!(
        number = cursor.number,
        hash = %short_hash(&cursor.hash),
        branch = branch.len(),
        "found common ancestor"
    );

    Ok(CommonAncestor {
        header: cursor,
        total_difficulty,
        branch,
    })
}
