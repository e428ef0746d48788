// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # MESS Protocol: Chain Selection with Artificial Finality
//!
//! Fork choice for a proof-of-work chain, hardened against deep reorgs.
//! Plain heaviest-chain selection happily swaps hours of history for a
//! private chain with marginally more work; here a candidate that forks off
//! the canonical chain must also beat an "antigravity" curve that demands
//! more and more relative work the longer the fork has been diverging.
//!
//! ## Architecture
//!
//! - **config** - Protocol constants and runtime configuration.
//! - **storage** - Headers, total difficulties, canonical index, ancient tier.
//! - **consensus** - Difficulty calculation and pass-through header validation.
//! - **finality** - Antigravity curves, common ancestors, TD ratios, decisions.
//! - **chain** - The `Blockchain` engine that applies decisions atomically.
//! - **metrics** / **logging** - Prometheus counters and tracing setup.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mess_protocol::prelude::*;
//!
//! let db = Arc::new(ChainDb::open_temporary()?);
//! let chain = Blockchain::new(db, Header::genesis(0, GENESIS_DIFFICULTY), ChainConfig::default())?;
//! chain.set_artificial_finality_enabled(true);
//!
//! let headers = ChainGenerator::default().generate_with_offset(&chain.current_block(), 10, 0);
//! let summary = chain.insert_segment(&headers)?;
//! assert_eq!(summary.decision, Some(Decision::HeadSwitch));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod chain;
pub mod config;
pub mod consensus;
pub mod error;
pub mod finality;
pub mod logging;
pub mod metrics;
pub mod storage;

/// The types most callers need.
pub mod prelude {
    pub use crate::chain::{Blockchain, ChainEvent, ChainGenerator, InsertSummary};
    pub use crate::config::{ChainConfig, FinalityConfig, GENESIS_DIFFICULTY};
    pub use crate::error::{ChainError, InsertError};
    pub use crate::finality::{AntigravityCurve, CurveKind, Decision, Evaluation, Rejection};
    pub use crate::storage::{ChainDb, Hash, Header, HeaderReader};
}
