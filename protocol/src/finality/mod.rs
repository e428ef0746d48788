//! # Artificial Finality
//!
//! Pure heaviest-chain selection lets anyone with enough rented hashpower
//! rewrite hours of history. The antigravity gate adds a time-weighted
//! penalty: a candidate that forks off the canonical chain must carry
//! proportionally more total difficulty the longer it has been diverging.
//! Short honest races are barely affected; deep, long-running private
//! chains need up to 31x the work of the chain they want to replace.
//!
//! ## Architecture
//!
//! ```text
//! antigravity.rs  required-ratio curves (sinusoidal, exponential)
//! ancestor.rs     common-ancestor search over stored headers
//! ratio.rs        TD ratio + per-block RatioTracker fold
//! decision.rs     Decision / Rejection / Evaluation and the pure `decide`
//! ```
//!
//! ## Evaluation Order
//!
//! ```text
//! segment ─▶ find_common_ancestor ─▶ RatioTracker (fold) ─▶ decide(gate, points, head TD)
//! ```
//!
//! Everything in here is read-only. Applying a decision is the chain's job.

pub mod ancestor;
pub mod antigravity;
pub mod decision;
pub mod ratio;

pub use ancestor::{find_common_ancestor, CommonAncestor};
pub use antigravity::{AntigravityCurve, CurveKind, ExponentialCurve, SinusoidalCurve};
pub use decision::{decide, Decision, Evaluation, Rejection};
pub use ratio::{td_ratio, total_difficulty_ratio, RatioPoint, RatioTracker, UNBOUNDED_RATIO};
