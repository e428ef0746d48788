//! # Chain Errors
//!
//! The error taxonomy of chain selection. Storage, validation and config
//! errors from the lower layers fold into [`ChainError`] via `#[from]`;
//! insertion wraps it in [`InsertError`] so the caller also learns which
//! element of the submitted segment caused the failure.

use crate::config::ConfigError;
use crate::consensus::ValidationError;
use crate::finality::Rejection;
use crate::storage::{short_hash, DbError, Hash};

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// No common ancestor with the canonical chain, or the fork point lies
    /// below the oldest header still eligible as an ancestor.
    #[error("unknown ancestor {} (forks must branch at or above #{retained_from})", short_hash(.hash))]
    UnknownAncestor { hash: Hash, retained_from: u64 },

    /// The segment's first new header names a parent that is not stored.
    #[error("unknown parent {}: not stored", short_hash(.hash))]
    UnknownParent { hash: Hash },

    #[error("artificial finality rejected segment: {0}")]
    ArtificialFinalityRejected(Rejection),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("missing total difficulty for {}", short_hash(.hash))]
    MissingTotalDifficulty { hash: Hash },

    #[error("missing header {}", short_hash(.hash))]
    MissingHeader { hash: Hash },

    #[error("stored genesis {} does not match {}", short_hash(.stored), short_hash(.expected))]
    GenesisMismatch { stored: Hash, expected: Hash },

    #[error("storage error: {0}")]
    Storage(#[from] DbError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ChainError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::ArtificialFinalityRejected(_))
    }

    /// True for both a missing parent and a fork below the retained horizon.
    pub fn is_unknown_ancestor(&self) -> bool {
        matches!(self, Self::UnknownAncestor { .. } | Self::UnknownParent { .. })
    }
}

/// A failed insertion, carrying the index of the offending segment element.
#[derive(Debug, thiserror::Error)]
#[error("insert failed at segment index {index}: {error}")]
pub struct InsertError {
    pub index: usize,
    #[source]
    pub error: ChainError,
}

impl InsertError {
    pub fn new(index: usize, error: impl Into<ChainError>) -> Self {
        Self {
            index,
            error: error.into(),
        }
    }

    /// The rejection details, if the artificial finality gate refused the
    /// segment.
    pub fn rejection(&self) -> Option<&Rejection> {
        match &self.error {
            ChainError::ArtificialFinalityRejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
