//! # Total-Difficulty Ratio
//!
//! How much work has the candidate added since the fork, relative to how
//! much the local chain added over the same stretch?
//!
//! ```text
//!          TD(candidate) - TD(ancestor)
//! ratio = ------------------------------
//!          TD(canonical) - TD(ancestor)
//! ```
//!
//! `canonical` is the canonical header at the candidate's height, or the
//! canonical head when the candidate is already taller. When the local
//! chain has added nothing since the fork (the ancestor *is* the head) the
//! ratio is unbounded and reported as [`UNBOUNDED_RATIO`].
//!
//! [`RatioTracker`] folds this over a candidate segment one header at a
//! time, accumulating the candidate's TD as it goes so every point costs a
//! single canonical lookup.

use tracing::debug;

use super::ancestor::CommonAncestor;
use super::antigravity::AntigravityCurve;
use crate::error::{ChainError, ChainResult};
use crate::storage::{Difficulty, Hash, Header, HeaderReader};

/// Sentinel ratio for a fork whose canonical side added no work.
pub const UNBOUNDED_RATIO: f64 = f64::MAX;

/// The ratio of candidate work to canonical work since the ancestor.
pub fn td_ratio(ancestor_td: Difficulty, canonical_td: Difficulty, candidate_td: Difficulty) -> f64 {
    let denominator = canonical_td.saturating_sub(ancestor_td);
    if denominator == 0 {
        return UNBOUNDED_RATIO;
    }
    let numerator = candidate_td.saturating_sub(ancestor_td);
    numerator as f64 / denominator as f64
}

fn stored_td<R: HeaderReader + ?Sized>(reader: &R, hash: &Hash) -> ChainResult<Difficulty> {
    reader
        .total_difficulty(hash)?
        .ok_or(ChainError::MissingTotalDifficulty { hash: *hash })
}

/// [`td_ratio`] for three stored headers.
pub fn total_difficulty_ratio<R: HeaderReader + ?Sized>(
    reader: &R,
    ancestor: &Header,
    canonical: &Header,
    candidate: &Header,
) -> ChainResult<f64> {
    Ok(td_ratio(
        stored_td(reader, &ancestor.hash)?,
        stored_td(reader, &canonical.hash)?,
        stored_td(reader, &candidate.hash)?,
    ))
}

// ---------------------------------------------------------------------------
// RatioPoint
// ---------------------------------------------------------------------------

/// Ratio diagnostics for one candidate header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioPoint {
    pub number: u64,
    pub hash: Hash,
    pub total_difficulty: Difficulty,
    /// TD of the canonical header the candidate was compared against.
    pub canonical_total_difficulty: Difficulty,
    pub ratio: f64,
    /// Seconds between the ancestor and this header.
    pub elapsed: u64,
}

impl RatioPoint {
    /// Ratio the curve would demand at this point.
    pub fn required(&self, curve: &AntigravityCurve) -> f64 {
        curve.required_ratio(self.elapsed as f64)
    }

    pub fn passes(&self, curve: &AntigravityCurve) -> bool {
        self.ratio >= self.required(curve)
    }
}

// ---------------------------------------------------------------------------
// RatioTracker
// ---------------------------------------------------------------------------

/// Accumulator over a candidate segment.
pub struct RatioTracker<'a, R: ?Sized> {
    reader: &'a R,
    ancestor_td: Difficulty,
    ancestor_timestamp: u64,
    head_number: u64,
    td: Difficulty,
    points: Vec<RatioPoint>,
}

impl<'a, R: HeaderReader + ?Sized> RatioTracker<'a, R> {
    /// Start a fold whose first pushed header is a child of a header with
    /// total difficulty `parent_td`.
    pub fn new(
        reader: &'a R,
        ancestor: &CommonAncestor,
        parent_td: Difficulty,
        head_number: u64,
    ) -> Self {
        Self {
            reader,
            ancestor_td: ancestor.total_difficulty,
            ancestor_timestamp: ancestor.header.timestamp,
            head_number,
            td: parent_td,
            points: Vec::new(),
        }
    }

    pub fn push(&mut self, header: &Header) -> ChainResult<&RatioPoint> {
        self.td = self.td.saturating_add(header.difficulty);

        let comparison = header.number.min(self.head_number);
        let canonical_hash = self
            .reader
            .canonical_hash(comparison)?
            .ok_or(ChainError::MissingHeader { hash: header.hash })?;
        let canonical_td = stored_td(self.reader, &canonical_hash)?;

        let point = RatioPoint {
            number: header.number,
            hash: header.hash,
            total_difficulty: self.td,
            canonical_total_difficulty: canonical_td,
            ratio: td_ratio(self.ancestor_td, canonical_td, self.td),
            elapsed: header.timestamp.saturating_sub(self.ancestor_timestamp),
        };
        debug!(
            number = point.number,
            ratio = point.ratio,
            elapsed = point.elapsed,
            "candidate td ratio"
        );
        self.points.push(point);
        Ok(&self.points[self.points.len() - 1])
    }

    /// Candidate TD through the last pushed header.
    pub fn total_difficulty(&self) -> Difficulty {
        self.td
    }

    pub fn last(&self) -> Option<&RatioPoint> {
        self.points.last()
    }

    pub fn into_points(self) -> Vec<RatioPoint> {
        self.points
    }
}
