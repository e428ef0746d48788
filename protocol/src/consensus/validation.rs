//! Header validation.
//!
//! Two layers. [`check_segment`] is purely structural: hashes match their
//! contents and each header links to the one before it. [`HeaderValidator`]
//! is the consensus check of one header against its parent. The default
//! implementation, [`DifficultyValidator`], enforces increasing timestamps
//! and the exact difficulty from the calculator; proof-of-work sealing is
//! trusted.

use std::fmt;

use super::difficulty::DifficultyCalculator;
use crate::storage::{short_hash, Difficulty, Hash, Header};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("header #{number} hash does not match its contents")]
    HashMismatch { number: u64 },

    #[error("header #{number} parent {} does not match previous header {}", short_hash(.parent_hash), short_hash(.expected))]
    BrokenLink {
        number: u64,
        parent_hash: Hash,
        expected: Hash,
    },

    #[error("non-sequential header: expected #{expected}, got #{got}")]
    NonSequential { expected: u64, got: u64 },

    #[error("header #{number} timestamp {timestamp} not after parent timestamp {parent_timestamp}")]
    TimestampNotIncreasing {
        number: u64,
        timestamp: u64,
        parent_timestamp: u64,
    },

    #[error("header #{number} difficulty {got}, expected {expected}")]
    DifficultyMismatch {
        number: u64,
        expected: Difficulty,
        got: Difficulty,
    },
}

/// Consensus validation of a header against its parent.
pub trait HeaderValidator: Send + Sync + fmt::Debug {
    fn validate(&self, parent: &Header, header: &Header) -> Result<(), ValidationError>;
}

/// Check that every header hashes correctly and links to its predecessor.
///
/// On failure returns the index of the offending header.
pub fn check_segment(segment: &[Header]) -> Result<(), (usize, ValidationError)> {
    for (index, header) in segment.iter().enumerate() {
        if !header.verify_hash() {
            return Err((index, ValidationError::HashMismatch { number: header.number }));
        }
        if index == 0 {
            continue;
        }
        let previous = &segment[index - 1];
        check_link(previous, header).map_err(|err| (index, err))?;
    }
    Ok(())
}

fn check_link(parent: &Header, header: &Header) -> Result<(), ValidationError> {
    // A parent at u64::MAX has no valid child.
    if parent.number.checked_add(1) != Some(header.number) {
        return Err(ValidationError::NonSequential {
            expected: parent.number.saturating_add(1),
            got: header.number,
        });
    }
    if header.parent_hash != parent.hash {
        return Err(ValidationError::BrokenLink {
            number: header.number,
            parent_hash: header.parent_hash,
            expected: parent.hash,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// DifficultyValidator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct DifficultyValidator {
    calculator: DifficultyCalculator,
}

impl DifficultyValidator {
    pub fn new(calculator: DifficultyCalculator) -> Self {
        Self { calculator }
    }
}

impl HeaderValidator for DifficultyValidator {
    fn validate(&self, parent: &Header, header: &Header) -> Result<(), ValidationError> {
        check_link(parent, header)?;

        if header.timestamp <= parent.timestamp {
            return Err(ValidationError::TimestampNotIncreasing {
                number: header.number,
                timestamp: header.timestamp,
                parent_timestamp: parent.timestamp,
            });
        }

        let expected = self.calculator.calculate(parent, header.timestamp);
        if header.difficulty != expected {
            return Err(ValidationError::DifficultyMismatch {
                number: header.number,
                expected,
                got: header.difficulty,
            });
        }
        Ok(())
    }
}
