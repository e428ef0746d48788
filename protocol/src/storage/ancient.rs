//! # Ancient Store
//!
//! Old canonical headers don't need to live in the hot key-value store
//! forever. Once they are deep enough that nothing will ever reorg them,
//! they can be appended to an "ancient" tier: an append-only, height-indexed
//! log that may be local, remote, or anything else that implements
//! [`AncientStore`].
//!
//! The contract is deliberately small. Items are appended strictly in height
//! order starting at zero, and the only way to remove them is to truncate
//! the tail. That is enough for the hot store to roll back a half-finished
//! migration.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::header::{Difficulty, Header};

/// Errors reported by an ancient tier.
#[derive(Debug, thiserror::Error)]
pub enum AncientError {
    #[error("out-of-order append: expected item {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("cannot truncate to {requested} items: only {available} stored")]
    TruncateBeyond { requested: u64, available: u64 },

    #[error("ancient store unavailable: {0}")]
    Unavailable(String),
}

/// A frozen canonical header together with its total difficulty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenHeader {
    pub header: Header,
    pub total_difficulty: Difficulty,
}

/// Capability interface for the ancient tier.
pub trait AncientStore: Send + Sync + fmt::Debug {
    /// Number of frozen items. Item `n` is the canonical header at height `n`.
    fn ancients(&self) -> Result<u64, AncientError>;

    /// Append the next item. `item.header.number` must equal `ancients()`.
    fn append(&self, item: FrozenHeader) -> Result<(), AncientError>;

    /// Drop every item at index `items` and above.
    fn truncate(&self, items: u64) -> Result<(), AncientError>;

    /// Fetch the frozen item at `number`, if present.
    fn retrieve(&self, number: u64) -> Result<Option<FrozenHeader>, AncientError>;
}

// ---------------------------------------------------------------------------
// MemoryAncients
// ---------------------------------------------------------------------------

/// In-process ancient tier backed by a vector.
#[derive(Debug, Default)]
pub struct MemoryAncients {
    items: RwLock<Vec<FrozenHeader>>,
}

impl MemoryAncients {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AncientStore for MemoryAncients {
    fn ancients(&self) -> Result<u64, AncientError> {
        Ok(self.items.read().len() as u64)
    }

    fn append(&self, item: FrozenHeader) -> Result<(), AncientError> {
        let mut items = self.items.write();
        let expected = items.len() as u64;
        if item.header.number != expected {
            return Err(AncientError::OutOfOrder {
                expected,
                got: item.header.number,
            });
        }
        items.push(item);
        Ok(())
    }

    fn truncate(&self, items: u64) -> Result<(), AncientError> {
        let mut stored = self.items.write();
        let available = stored.len() as u64;
        if items > available {
            return Err(AncientError::TruncateBeyond {
                requested: items,
                available,
            });
        }
        stored.truncate(items as usize);
        Ok(())
    }

    fn retrieve(&self, number: u64) -> Result<Option<FrozenHeader>, AncientError> {
        Ok(self.items.read().get(number as usize).cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn frozen_run(count: u64) -> Vec<FrozenHeader> {
        let mut out = Vec::new();
        let mut parent = Header::genesis(0, 1_000);
        out.push(FrozenHeader {
            header: parent.clone(),
            total_difficulty: 1_000,
        });
        for i in 1..count {
            let child = Header::new(&parent, i * 10, 1_000, i);
            out.push(FrozenHeader {
                header: child.clone(),
                total_difficulty: 1_000 * (i as u128 + 1),
            });
            parent = child;
        }
        out
    }

    #[test]
    fn append_in_order() {
        let store = MemoryAncients::new();
        for item in frozen_run(5) {
            store.append(item).expect("append");
        }
        assert_eq!(store.ancients().unwrap(), 5);
        let third = store.retrieve(3).unwrap().expect("item 3");
        assert_eq!(third.header.number, 3);
        assert_eq!(third.total_difficulty, 4_000);
        assert!(store.retrieve(5).unwrap().is_none());
    }

    #[test]
    fn rejects_gaps() {
        let store = MemoryAncients::new();
        let run = frozen_run(3);
        store.append(run[0].clone()).unwrap();
        let err = store.append(run[2].clone()).expect_err("gap must fail");
        assert!(matches!(err, AncientError::OutOfOrder { expected: 1, got: 2 }));
    }

    #[test]
    fn truncate_rolls_back_tail() {
        let store = MemoryAncients::new();
        for item in frozen_run(6) {
            store.append(item).unwrap();
        }
        store.truncate(2).unwrap();
        assert_eq!(store.ancients().unwrap(), 2);
        assert!(store.retrieve(2).unwrap().is_none());
        assert!(store.truncate(3).is_err());
    }
}
