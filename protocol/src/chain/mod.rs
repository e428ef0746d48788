//! # Chain Module
//!
//! The stateful side of chain selection: a [`Blockchain`] owns the header
//! store, the current heads and the finality settings, and turns
//! [`crate::finality`] decisions into canonical-chain updates.
//!
//! ## Architecture
//!
//! ```text
//! blockchain.rs  Blockchain: insertion pipeline, heads, events, freezer
//! generator.rs   ChainGenerator: valid header runs for tests and benches
//! ```

pub mod blockchain;
pub mod generator;

pub use blockchain::{Blockchain, ChainEvent, InsertSummary};
pub use generator::{BlockBuilder, ChainGenerator};
