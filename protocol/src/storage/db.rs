//! # ChainDb: Persistent Header Store
//!
//! The persistence layer for chain selection, built on sled's embedded
//! key-value store. Every header the node has ever accepted (canonical or
//! side chain) lives here together with its total difficulty, plus the
//! canonical index and the two head pointers.
//!
//! ## Tree Layout
//!
//! | Tree        | Key                | Value                 |
//! |-------------|--------------------|-----------------------|
//! | `headers`   | `hash` (32B)       | `bincode(Header)`     |
//! | `tds`       | `hash` (32B)       | total difficulty (16B BE) |
//! | `numbers`   | `hash` (32B)       | `height` (8B BE)      |
//! | `canonical` | `height` (8B BE)   | `hash` (32B)          |
//! | `metadata`  | key (UTF-8)        | value (bytes)         |
//!
//! Heights are stored as big-endian u64 so that sled's lexicographic
//! ordering matches numeric ordering.
//!
//! ## Atomicity
//!
//! All mutations go through [`ChainWrite`], which is applied in a single
//! multi-tree sled transaction. New headers, canonical-index rewrites and
//! both head pointers become visible together or not at all.
//!
//! ## Ancient Tier
//!
//! Canonical headers below the freeze limit are migrated to an
//! [`AncientStore`] and removed from the hot trees. The `numbers` index is
//! kept for frozen headers so lookups by hash still find them. Every read
//! falls through to the ancient tier transparently.

use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional,
};
use sled::{Db, Tree};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, trace};

use super::ancient::{AncientError, AncientStore, FrozenHeader, MemoryAncients};
use super::header::{short_hash, Difficulty, Hash, Header};
use super::reader::HeaderReader;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("ancient store error: {0}")]
    Ancient(#[from] AncientError),

    #[error("canonical #{number} changed while freezing")]
    CanonicalMoved { number: u64 },
}

pub type DbResult<T> = Result<T, DbError>;

impl From<TransactionError<DbError>> for DbError {
    fn from(err: TransactionError<DbError>) -> Self {
        match err {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => DbError::Sled(inner),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata Keys & Encoding
// ---------------------------------------------------------------------------

const META_HEAD_BLOCK: &[u8] = b"head_block";
const META_HEAD_HEADER: &[u8] = b"head_header";

fn encode_number(number: u64) -> [u8; 8] {
    number.to_be_bytes()
}

fn decode_number(raw: &[u8]) -> DbResult<u64> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| DbError::Serialization(format!("height has {} bytes, want 8", raw.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_td(raw: &[u8]) -> DbResult<Difficulty> {
    let bytes: [u8; 16] = raw
        .try_into()
        .map_err(|_| DbError::Serialization(format!("td has {} bytes, want 16", raw.len())))?;
    Ok(u128::from_be_bytes(bytes))
}

fn decode_hash(raw: &[u8]) -> DbResult<Hash> {
    raw.try_into()
        .map_err(|_| DbError::Serialization(format!("hash has {} bytes, want 32", raw.len())))
}

fn decode_header(raw: &[u8]) -> DbResult<Header> {
    bincode::deserialize(raw).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// ChainWrite
// ---------------------------------------------------------------------------

/// A set of mutations applied atomically by [`ChainDb::commit`].
#[derive(Debug, Default, Clone)]
pub struct ChainWrite {
    headers: Vec<(Header, Difficulty)>,
    canonical: Vec<(u64, Hash)>,
    uncanonical: Vec<u64>,
    head_block: Option<Hash>,
    head_header: Option<Hash>,
}

impl ChainWrite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a header with its total difficulty.
    pub fn put_header(&mut self, header: Header, total_difficulty: Difficulty) -> &mut Self {
        self.headers.push((header, total_difficulty));
        self
    }

    pub fn set_canonical(&mut self, number: u64, hash: Hash) -> &mut Self {
        self.canonical.push((number, hash));
        self
    }

    /// Remove the canonical entry at `number`. Applied before `set_canonical`.
    pub fn delete_canonical(&mut self, number: u64) -> &mut Self {
        self.uncanonical.push(number);
        self
    }

    pub fn set_head_block(&mut self, hash: Hash) -> &mut Self {
        self.head_block = Some(hash);
        self
    }

    pub fn set_head_header(&mut self, hash: Hash) -> &mut Self {
        self.head_header = Some(hash);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
            && self.canonical.is_empty()
            && self.uncanonical.is_empty()
            && self.head_block.is_none()
            && self.head_header.is_none()
    }
}

// ---------------------------------------------------------------------------
// ChainDb
// ---------------------------------------------------------------------------

/// Persistent header store with canonical index, head pointers and an
/// optional ancient tier.
///
/// # Thread Safety
///
/// sled trees support lock-free concurrent reads and serialized writes, so
/// `ChainDb` can be shared via `Arc<ChainDb>`. Callers that need
/// read-then-write atomicity (chain insertion) provide their own lock.
#[derive(Debug, Clone)]
pub struct ChainDb {
    db: Db,
    headers: Tree,
    tds: Tree,
    numbers: Tree,
    canonical: Tree,
    metadata: Tree,
    ancients: Arc<dyn AncientStore>,
}

impl ChainDb {
    /// Open or create a database at the given path with an in-memory
    /// ancient tier.
    ///
    /// In-memory ancients do not survive a restart; use
    /// [`ChainDb::open_with_ancients`] with a durable tier if headers are
    /// ever frozen.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::open_with_ancients(path, Arc::new(MemoryAncients::new()))
    }

    pub fn open_with_ancients<P: AsRef<Path>>(
        path: P,
        ancients: Arc<dyn AncientStore>,
    ) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db, ancients)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> DbResult<Self> {
        Self::open_temporary_with_ancients(Arc::new(MemoryAncients::new()))
    }

    pub fn open_temporary_with_ancients(ancients: Arc<dyn AncientStore>) -> DbResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, ancients)
    }

    fn from_db(db: Db, ancients: Arc<dyn AncientStore>) -> DbResult<Self> {
        Ok(Self {
            headers: db.open_tree("headers")?,
            tds: db.open_tree("tds")?,
            numbers: db.open_tree("numbers")?,
            canonical: db.open_tree("canonical")?,
            metadata: db.open_tree("metadata")?,
            db,
            ancients,
        })
    }

    // -- Writes -------------------------------------------------------------

    /// Apply a [`ChainWrite`] atomically.
    pub fn commit(&self, write: &ChainWrite) -> DbResult<()> {
        if write.is_empty() {
            return Ok(());
        }

        let mut header_rows = Vec::with_capacity(write.headers.len());
        for (header, td) in &write.headers {
            let encoded =
                bincode::serialize(header).map_err(|e| DbError::Serialization(e.to_string()))?;
            header_rows.push((header.hash, encoded, td.to_be_bytes(), encode_number(header.number)));
        }

        (&self.headers, &self.tds, &self.numbers, &self.canonical, &self.metadata)
            .transaction(
                |(headers, tds, numbers, canonical, metadata)| -> ConflictableTransactionResult<(), DbError> {
                    for (hash, encoded, td, number) in &header_rows {
                        headers.insert(&hash[..], encoded.as_slice())?;
                        tds.insert(&hash[..], &td[..])?;
                        numbers.insert(&hash[..], &number[..])?;
                    }
                    for number in &write.uncanonical {
                        canonical.remove(&encode_number(*number)[..])?;
                    }
                    for (number, hash) in &write.canonical {
                        canonical.insert(&encode_number(*number)[..], &hash[..])?;
                    }
                    if let Some(hash) = &write.head_block {
                        metadata.insert(META_HEAD_BLOCK, &hash[..])?;
                    }
                    if let Some(hash) = &write.head_header {
                        metadata.insert(META_HEAD_HEADER, &hash[..])?;
                    }
                    Ok(())
                },
            )?;
        Ok(())
    }

    /// Migrate canonical headers below `limit` into the ancient tier.
    ///
    /// Returns the number of frozen items afterwards. If any append fails,
    /// or the hot copies cannot be removed, the ancient tier is truncated
    /// back to where it started and the hot trees are left untouched.
    pub fn freeze(&self, limit: u64) -> DbResult<u64> {
        let frozen = self.ancients.ancients()?;
        if limit <= frozen {
            return Ok(frozen);
        }

        let mut batch = Vec::with_capacity((limit - frozen) as usize);
        for number in frozen..limit {
            let hash = self
                .hot_canonical_hash(number)?
                .ok_or_else(|| DbError::NotFound(format!("canonical hash #{number}")))?;
            let header = self
                .hot_header(&hash)?
                .ok_or_else(|| DbError::NotFound(format!("header {}", hex::encode(hash))))?;
            let total_difficulty = self
                .hot_td(&hash)?
                .ok_or_else(|| DbError::NotFound(format!("td {}", hex::encode(hash))))?;
            batch.push(FrozenHeader {
                header,
                total_difficulty,
            });
        }

        for item in &batch {
            if let Err(err) = self.ancients.append(item.clone()) {
                self.rollback_ancients(frozen);
                return Err(err.into());
            }
        }

        let removed = (&self.headers, &self.tds, &self.canonical).transaction(
            |(headers, tds, canonical)| -> ConflictableTransactionResult<(), DbError> {
                for item in &batch {
                    let number = item.header.number;
                    let key = encode_number(number);
                    if canonical.get(&key[..])?.as_deref() != Some(&item.header.hash[..]) {
                        return Err(ConflictableTransactionError::Abort(
                            DbError::CanonicalMoved { number },
                        ));
                    }
                    headers.remove(&item.header.hash[..])?;
                    tds.remove(&item.header.hash[..])?;
                    canonical.remove(&key[..])?;
                }
                Ok(())
            },
        );
        if let Err(err) = removed {
            self.rollback_ancients(frozen);
            return Err(err.into());
        }

        info!(from = frozen, to = limit, "froze canonical headers");
        Ok(limit)
    }

    fn rollback_ancients(&self, items: u64) {
        if let Err(err) = self.ancients.truncate(items) {
            error!(items, error = %err, "failed to roll back ancient store");
        }
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }

    // -- Reads --------------------------------------------------------------

    pub fn head_block_hash(&self) -> DbResult<Option<Hash>> {
        self.metadata
            .get(META_HEAD_BLOCK)?
            .map(|raw| decode_hash(&raw))
            .transpose()
    }

    pub fn head_header_hash(&self) -> DbResult<Option<Hash>> {
        self.metadata
            .get(META_HEAD_HEADER)?
            .map(|raw| decode_hash(&raw))
            .transpose()
    }

    /// `true` if a header with `hash` is stored in either tier.
    pub fn has_header(&self, hash: &Hash) -> DbResult<bool> {
        if self.headers.contains_key(hash)? {
            return Ok(true);
        }
        Ok(self.frozen_by_hash(hash)?.is_some())
    }

    /// Number of headers frozen into the ancient tier.
    pub fn ancients(&self) -> DbResult<u64> {
        Ok(self.ancients.ancients()?)
    }

    /// Number of headers in the hot trees.
    pub fn hot_header_count(&self) -> usize {
        self.headers.len()
    }

    fn hot_header(&self, hash: &Hash) -> DbResult<Option<Header>> {
        self.headers
            .get(hash)?
            .map(|raw| decode_header(&raw))
            .transpose()
    }

    fn hot_td(&self, hash: &Hash) -> DbResult<Option<Difficulty>> {
        self.tds.get(hash)?.map(|raw| decode_td(&raw)).transpose()
    }

    fn hot_canonical_hash(&self, number: u64) -> DbResult<Option<Hash>> {
        self.canonical
            .get(encode_number(number))?
            .map(|raw| decode_hash(&raw))
            .transpose()
    }

    fn frozen_by_hash(&self, hash: &Hash) -> DbResult<Option<FrozenHeader>> {
        let Some(raw) = self.numbers.get(hash)? else {
            return Ok(None);
        };
        let number = decode_number(&raw)?;
        if number >= self.ancients.ancients()? {
            return Ok(None);
        }
        match self.ancients.retrieve(number)? {
            Some(item) if item.header.hash == *hash => Ok(Some(item)),
            _ => Ok(None),
        }
    }
}

impl HeaderReader for ChainDb {
    fn header_by_hash(&self, hash: &Hash) -> DbResult<Option<Header>> {
        if let Some(header) = self.hot_header(hash)? {
            return Ok(Some(header));
        }
        Ok(self.frozen_by_hash(hash)?.map(|item| item.header))
    }

    fn total_difficulty(&self, hash: &Hash) -> DbResult<Option<Difficulty>> {
        if let Some(td) = self.hot_td(hash)? {
            return Ok(Some(td));
        }
        Ok(self.frozen_by_hash(hash)?.map(|item| item.total_difficulty))
    }

    fn canonical_hash(&self, number: u64) -> DbResult<Option<Hash>> {
        if number < self.ancients.ancients()? {
            let item = self.ancients.retrieve(number)?;
            return Ok(item.map(|item| item.header.hash));
        }
        let hash = self.hot_canonical_hash(number)?;
        if let Some(hash) = &hash {
            trace!(number, hash = %short_hash(hash), "canonical lookup");
        }
        Ok(hash)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
