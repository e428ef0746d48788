//! # Storage Module
//!
//! Persistent storage for headers, total difficulties and the canonical
//! index. Everything chain selection reads comes through here.
//!
//! ## Architecture
//!
//! ```text
//! header.rs   Header structure, BLAKE3 hashing, genesis
//! reader.rs   HeaderReader: the read-only lookup interface
//! db.rs       ChainDb: sled persistence, atomic ChainWrite commits, freezing
//! ancient.rs  AncientStore capability + in-memory implementation
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! ChainWrite ──commit──▶ ChainDb (hot trees) ──freeze──▶ AncientStore
//!                            ▲                               │
//!                            └────── reads fall through ◀────┘
//! ```
//!
//! ## Design Decisions
//!
//! 1. **BLAKE3 header hashes.** Fast on every architecture that matters
//!    and the hash is the primary key of nearly every tree.
//!
//! 2. **Bincode for on-disk serialization.** Compact, fast, deterministic.
//!    JSON is for configs and debugging; bincode is for storage.
//!
//! 3. **Total difficulty is stored, never recomputed.** Each header's TD is
//!    written alongside it, so ratio evaluation is O(1) lookups per block.

pub mod ancient;
pub mod db;
pub mod header;
pub mod reader;

pub use ancient::{AncientError, AncientStore, FrozenHeader, MemoryAncients};
pub use db::{ChainDb, ChainWrite, DbError, DbResult};
pub use header::{short_hash, Difficulty, Hash, Header};
pub use reader::HeaderReader;
