//! Reorg decisions.
//!
//! [`decide`] is the whole policy in one pure function: given the gate (if
//! any), the fork point, one ratio point per new header and the current
//! head's total difficulty, it says what happens to the candidate.
//!
//! Only the prefix that would take over the head is gated. Every earlier
//! prefix is a side chain and every later one extends the new head, so a
//! candidate gets the same verdict whether it arrives whole or one header
//! at a time.

use std::fmt;

use super::ancestor::CommonAncestor;
use super::antigravity::AntigravityCurve;
use super::ratio::RatioPoint;
use crate::storage::{short_hash, Difficulty, Hash, Header};

/// Why the artificial finality gate refused a candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub ancestor_number: u64,
    pub ancestor_hash: Hash,
    /// First candidate header heavier than the head, the one that failed.
    pub number: u64,
    pub hash: Hash,
    /// Seconds between the ancestor and the failing header.
    pub elapsed: u64,
    pub ratio: f64,
    pub required: f64,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "td ratio {:.6} below required {:.6} after {}s (fork at #{} {}, block #{} {})",
            self.ratio,
            self.required,
            self.elapsed,
            self.ancestor_number,
            short_hash(&self.ancestor_hash),
            self.number,
            short_hash(&self.hash),
        )
    }
}

/// Outcome of evaluating a candidate segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// The candidate becomes the canonical chain.
    HeadSwitch,
    /// The candidate is stored but the head stays put.
    SideChainAccepted,
    /// The candidate is refused and nothing is stored.
    Rejected(Rejection),
}

impl Decision {
    pub fn is_head_switch(&self) -> bool {
        matches!(self, Self::HeadSwitch)
    }

    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::HeadSwitch => "head_switch",
            Self::SideChainAccepted => "side_chain",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Apply the heaviest-chain rule and the gate to a candidate's new headers.
///
/// The first point heavier than the head is the takeover point; with the
/// gate on it must clear the curve. Candidates that never outweigh the head
/// are side chains and are not gated. Ties keep the current head.
pub fn decide(
    gate: Option<&AntigravityCurve>,
    ancestor: &Header,
    points: &[RatioPoint],
    head_total_difficulty: Difficulty,
) -> Decision {
    let Some(takeover) = points
        .iter()
        .find(|point| point.total_difficulty > head_total_difficulty)
    else {
        return Decision::SideChainAccepted;
    };

    if let Some(curve) = gate {
        let required = takeover.required(curve);
        if takeover.ratio < required {
            return Decision::Rejected(Rejection {
                ancestor_number: ancestor.number,
                ancestor_hash: ancestor.hash,
                number: takeover.number,
                hash: takeover.hash,
                elapsed: takeover.elapsed,
                ratio: takeover.ratio,
                required,
            });
        }
    }
    Decision::HeadSwitch
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Everything learned while evaluating one candidate segment.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub ancestor: CommonAncestor,
    /// Leading segment headers that were already stored and skipped.
    pub known: usize,
    /// One point per new header, in segment order.
    pub points: Vec<RatioPoint>,
    pub tip: RatioPoint,
    pub head: Header,
    pub head_total_difficulty: Difficulty,
    /// The curve in force for this evaluation, `None` if the gate was off.
    pub gate: Option<AntigravityCurve>,
    pub decision: Decision,
}

impl Evaluation {
    /// Ratio the curve demands at the tip's elapsed time, if the gate was on.
    pub fn required_ratio(&self) -> Option<f64> {
        self.gate.as_ref().map(|curve| self.tip.required(curve))
    }

    /// Canonical headers that a head switch would retire.
    pub fn reorg_depth(&self) -> u64 {
        self.head.number.saturating_sub(self.ancestor.number())
    }
}
