//! # Blockchain: The Reorg Decision Engine
//!
//! Accepts candidate header segments and decides, for each, whether it
//! becomes the canonical chain, is kept as a side chain, or is refused by
//! the artificial finality gate.
//!
//! ## Insertion Pipeline
//!
//! ```text
//! segment
//!   │ structural check (hashes, parent links)     ─▶ Validation @ index
//!   │ skip already-stored prefix                   ─▶ no-op if nothing new
//!   │ parent lookup + consensus validation         ─▶ UnknownParent / Validation
//!   │ common ancestor                              ─▶ UnknownAncestor
//!   │ TD-ratio fold over new headers
//!   │ decide(gate snapshot, points, head TD)       ─▶ ArtificialFinalityRejected @ takeover
//!   ▼ one atomic ChainWrite
//! ```
//!
//! ## Concurrency
//!
//! Insertions on one chain are serialised by an insertion mutex, so
//! "evaluate, then apply" is atomic with respect to other insertions. The
//! finality settings sit behind their own `RwLock` and are copied once at
//! the start of each evaluation; toggling the gate mid-evaluation only
//! affects later evaluations. Independent `Blockchain` instances share
//! nothing.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::{ChainConfig, FinalityConfig};
use crate::consensus::{
    check_segment, DifficultyCalculator, DifficultyValidator, HeaderValidator, ValidationError,
};
use crate::error::{ChainError, ChainResult, InsertError};
use crate::finality::{
    decide, find_common_ancestor, total_difficulty_ratio, Decision, Evaluation, RatioTracker,
};
use crate::metrics::ChainMetrics;
use crate::storage::{short_hash, ChainDb, ChainWrite, DbResult, Difficulty, Hash, Header, HeaderReader};

// ---------------------------------------------------------------------------
// Public Types
// ---------------------------------------------------------------------------

/// Chain notifications, delivered through [`Blockchain::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// The canonical head moved.
    HeadChanged {
        number: u64,
        hash: Hash,
        previous: Hash,
        /// Canonical headers retired by the switch (0 for a plain extension).
        reorg_depth: u64,
    },
    /// A candidate was stored without becoming canonical.
    SideChain { number: u64, hash: Hash, ancestor: u64 },
}

/// Result of a successful [`Blockchain::insert_segment`].
#[derive(Debug, Clone, PartialEq)]
pub struct InsertSummary {
    /// `None` when the segment held nothing new.
    pub decision: Option<Decision>,
    /// Leading headers that were already stored.
    pub known: usize,
    /// Headers written by this call.
    pub written: usize,
    pub head: Hash,
    pub head_number: u64,
}

#[derive(Debug, Clone)]
struct Heads {
    block: Header,
    header: Header,
}

/// A validated segment with the known prefix stripped off.
struct Prepared<'s> {
    known: usize,
    parent: Header,
    new: &'s [Header],
    body: &'s [Header],
    tip: &'s Header,
}

// ---------------------------------------------------------------------------
// Blockchain
// ---------------------------------------------------------------------------

pub struct Blockchain {
    db: Arc<ChainDb>,
    genesis: Header,
    finality: RwLock<FinalityConfig>,
    validator: Arc<dyn HeaderValidator>,
    heads: RwLock<Heads>,
    insert_lock: Mutex<()>,
    events: broadcast::Sender<ChainEvent>,
    metrics: ChainMetrics,
}

impl Blockchain {
    /// Open a chain on `db`, writing `genesis` if the store is empty.
    ///
    /// An existing store must have been created with the same genesis.
    pub fn new(db: Arc<ChainDb>, genesis: Header, config: ChainConfig) -> ChainResult<Self> {
        config.validate()?;
        if !genesis.is_genesis() || !genesis.verify_hash() {
            return Err(ValidationError::HashMismatch {
                number: genesis.number,
            }
            .into());
        }

        let heads = match db.head_block_hash()? {
            None => {
                let mut write = ChainWrite::new();
                write
                    .put_header(genesis.clone(), genesis.difficulty)
                    .set_canonical(0, genesis.hash)
                    .set_head_block(genesis.hash)
                    .set_head_header(genesis.hash);
                db.commit(&write)?;
                info!(hash = %short_hash(&genesis.hash), "wrote genesis header");
                Heads {
                    block: genesis.clone(),
                    header: genesis.clone(),
                }
            }
            Some(head_hash) => Self::load_heads(&db, &genesis, head_hash)?,
        };

        let (events, _) = broadcast::channel(config.event_capacity);
        let metrics = ChainMetrics::new()?;
        metrics.head_number.set(heads.block.number as i64);

        Ok(Self {
            validator: Arc::new(DifficultyValidator::new(DifficultyCalculator::new(
                config.difficulty,
            ))),
            db,
            genesis,
            finality: RwLock::new(config.finality),
            heads: RwLock::new(heads),
            insert_lock: Mutex::new(()),
            events,
            metrics,
        })
    }

    fn load_heads(db: &ChainDb, genesis: &Header, head_hash: Hash) -> ChainResult<Heads> {
        let stored = db
            .canonical_hash(0)?
            .ok_or(ChainError::MissingHeader { hash: genesis.hash })?;
        if stored != genesis.hash {
            return Err(ChainError::GenesisMismatch {
                stored,
                expected: genesis.hash,
            });
        }

        let block = db
            .header_by_hash(&head_hash)?
            .ok_or(ChainError::MissingHeader { hash: head_hash })?;
        let header = match db.head_header_hash()? {
            Some(hash) => db.header_by_hash(&hash)?,
            None => None,
        };
        let header = header.unwrap_or_else(|| {
            warn!(number = block.number, "header head missing, resetting to block head");
            block.clone()
        });

        info!(number = block.number, hash = %short_hash(&block.hash), "loaded chain head");
        Ok(Heads { block, header })
    }

    /// Replace the consensus validator.
    pub fn with_validator(mut self, validator: Arc<dyn HeaderValidator>) -> Self {
        self.validator = validator;
        self
    }

    // -- Accessors ------------------------------------------------------------

    pub fn genesis(&self) -> &Header {
        &self.genesis
    }

    pub fn db(&self) -> &Arc<ChainDb> {
        &self.db
    }

    /// The canonical head block.
    pub fn current_block(&self) -> Header {
        self.heads.read().block.clone()
    }

    /// The header ("fast") head.
    pub fn current_header(&self) -> Header {
        self.heads.read().header.clone()
    }

    pub fn header_by_hash(&self, hash: &Hash) -> ChainResult<Option<Header>> {
        Ok(self.db.header_by_hash(hash)?)
    }

    pub fn canonical_header(&self, number: u64) -> ChainResult<Option<Header>> {
        Ok(self.db.canonical_header(number)?)
    }

    pub fn total_difficulty(&self, hash: &Hash) -> ChainResult<Option<Difficulty>> {
        Ok(self.db.total_difficulty(hash)?)
    }

    pub fn metrics(&self) -> &ChainMetrics {
        &self.metrics
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    // -- Finality Settings ----------------------------------------------------

    pub fn set_artificial_finality_enabled(&self, enabled: bool) {
        self.finality.write().enabled = enabled;
        info!(enabled, "artificial finality toggled");
    }

    pub fn is_artificial_finality_enabled(&self) -> bool {
        self.finality.read().enabled
    }

    pub fn finality_config(&self) -> FinalityConfig {
        *self.finality.read()
    }

    pub fn set_finality_config(&self, config: FinalityConfig) -> ChainResult<()> {
        config.validate()?;
        *self.finality.write() = config;
        info!(enabled = config.enabled, curve = ?config.curve, "finality config replaced");
        Ok(())
    }

    /// Ratio the configured curve demands after `elapsed` seconds, whether
    /// or not the gate is currently enabled.
    pub fn required_ratio(&self, elapsed: f64) -> f64 {
        self.finality.read().antigravity().required_ratio(elapsed)
    }

    /// TD ratio of `candidate` against `canonical`, both measured from
    /// `ancestor`. All three must be stored.
    pub fn total_difficulty_ratio(
        &self,
        ancestor: &Header,
        canonical: &Header,
        candidate: &Header,
    ) -> ChainResult<f64> {
        total_difficulty_ratio(&*self.db, ancestor, canonical, candidate)
    }

    // -- Evaluation -----------------------------------------------------------

    /// Run the full decision pipeline on `segment` without writing anything.
    ///
    /// Returns `Ok(None)` if every header is already stored.
    pub fn evaluate_segment(&self, segment: &[Header]) -> Result<Option<Evaluation>, InsertError> {
        let _guard = self.insert_lock.lock();
        let finality = *self.finality.read();
        self.evaluate_locked(segment, &finality)
    }

    /// Evaluate independent candidates in parallel against one snapshot of
    /// the chain and the finality settings.
    pub fn evaluate_segments<S>(&self, segments: &[S]) -> Vec<Result<Option<Evaluation>, InsertError>>
    where
        S: AsRef<[Header]> + Sync,
    {
        let _guard = self.insert_lock.lock();
        let finality = *self.finality.read();
        segments
            .par_iter()
            .map(|segment| self.evaluate_locked(segment.as_ref(), &finality))
            .collect()
    }

    fn evaluate_locked(
        &self,
        segment: &[Header],
        finality: &FinalityConfig,
    ) -> Result<Option<Evaluation>, InsertError> {
        match self.prepare(segment)? {
            Some(prepared) => self.evaluate_prepared(&prepared, finality).map(Some),
            None => Ok(None),
        }
    }

    fn retained_from(&self) -> DbResult<u64> {
        Ok(self.db.ancients()?.saturating_sub(1))
    }

    fn stored_td(&self, hash: &Hash) -> ChainResult<Difficulty> {
        self.db
            .total_difficulty(hash)?
            .ok_or(ChainError::MissingTotalDifficulty { hash: *hash })
    }

    fn prepare<'s>(&self, segment: &'s [Header]) -> Result<Option<Prepared<'s>>, InsertError> {
        check_segment(segment).map_err(|(index, err)| InsertError::new(index, err))?;

        let mut known = 0;
        for header in segment {
            let stored = self
                .db
                .has_header(&header.hash)
                .map_err(|err| InsertError::new(known, err))?;
            if !stored {
                break;
            }
            known += 1;
        }

        let new = &segment[known..];
        let Some((tip, body)) = new.split_last() else {
            return Ok(None);
        };
        let first = &new[0];

        let parent = self
            .db
            .header_by_hash(&first.parent_hash)
            .map_err(|err| InsertError::new(known, err))?;
        let Some(parent) = parent else {
            return Err(InsertError::new(
                known,
                ChainError::UnknownParent {
                    hash: first.parent_hash,
                },
            ));
        };

        let mut prev = &parent;
        for (offset, header) in new.iter().enumerate() {
            self.validator
                .validate(prev, header)
                .map_err(|err| InsertError::new(known + offset, err))?;
            prev = header;
        }

        Ok(Some(Prepared {
            known,
            parent,
            new,
            body,
            tip,
        }))
    }

    fn evaluate_prepared(
        &self,
        prepared: &Prepared<'_>,
        finality: &FinalityConfig,
    ) -> Result<Evaluation, InsertError> {
        let fail = |err: ChainError| InsertError::new(prepared.known, err);

        let retained_from = self.retained_from().map_err(|err| fail(err.into()))?;
        let ancestor =
            find_common_ancestor(&*self.db, &prepared.parent.hash, retained_from).map_err(fail)?;

        let head = self.heads.read().block.clone();
        let head_total_difficulty = self.stored_td(&head.hash).map_err(fail)?;
        let parent_td = self.stored_td(&prepared.parent.hash).map_err(fail)?;

        let mut tracker = RatioTracker::new(&*self.db, &ancestor, parent_td, head.number);
        for header in prepared.body {
            tracker.push(header).map_err(fail)?;
        }
        let tip = *tracker.push(prepared.tip).map_err(fail)?;
        let points = tracker.into_points();

        let gate = finality.gate();
        let decision = decide(gate.as_ref(), &ancestor.header, &points, head_total_difficulty);

        debug!(
            ancestor = ancestor.number(),
            tip = tip.number,
            ratio = tip.ratio,
            decision = decision.label(),
            "evaluated candidate segment"
        );

        Ok(Evaluation {
            ancestor,
            known: prepared.known,
            points,
            tip,
            head,
            head_total_difficulty,
            gate,
            decision,
        })
    }

    // -- Insertion ------------------------------------------------------------

    /// Validate, evaluate and (unless rejected) store a candidate segment.
    ///
    /// On error nothing from the segment has been written and
    /// [`InsertError::index`] names the offending element. For a finality
    /// rejection that is the header which would have taken over the head.
    pub fn insert_segment(&self, segment: &[Header]) -> Result<InsertSummary, InsertError> {
        let result = self.insert_locked(segment);
        if let Err(err) = &result {
            match &err.error {
                ChainError::Validation(_) => self.metrics.validation_failures_total.inc(),
                ChainError::UnknownAncestor { .. } | ChainError::UnknownParent { .. } => {
                    self.metrics.unknown_ancestors_total.inc();
                    warn!(index = err.index, error = %err.error, "segment has no usable ancestor");
                }
                _ => {}
            }
        }
        result
    }

    fn insert_locked(&self, segment: &[Header]) -> Result<InsertSummary, InsertError> {
        let _guard = self.insert_lock.lock();
        let finality = *self.finality.read();

        let Some(prepared) = self.prepare(segment)? else {
            let head = self.current_block();
            return Ok(InsertSummary {
                decision: None,
                known: segment.len(),
                written: 0,
                head: head.hash,
                head_number: head.number,
            });
        };

        let evaluation = self.evaluate_prepared(&prepared, &finality)?;
        self.metrics.observe_decision(&evaluation.decision);

        if let Decision::Rejected(rejection) = &evaluation.decision {
            warn!(
                ancestor = rejection.ancestor_number,
                number = rejection.number,
                elapsed = rejection.elapsed,
                ratio = rejection.ratio,
                required = rejection.required,
                "artificial finality rejected candidate"
            );
            let first = prepared.new[0].number;
            let index = prepared.known + rejection.number.saturating_sub(first) as usize;
            return Err(InsertError::new(
                index,
                ChainError::ArtificialFinalityRejected(rejection.clone()),
            ));
        }

        self.apply(&prepared, &evaluation)
            .map_err(|err| InsertError::new(prepared.known, err))?;

        let head = self.current_block();
        Ok(InsertSummary {
            decision: Some(evaluation.decision),
            known: prepared.known,
            written: prepared.new.len(),
            head: head.hash,
            head_number: head.number,
        })
    }

    fn apply(&self, prepared: &Prepared<'_>, evaluation: &Evaluation) -> ChainResult<()> {
        let mut write = ChainWrite::new();
        for (header, point) in prepared.new.iter().zip(&evaluation.points) {
            write.put_header(header.clone(), point.total_difficulty);
        }

        let tip = prepared.tip;
        let previous = &evaluation.head;

        if !evaluation.decision.is_head_switch() {
            self.db.commit(&write)?;
            debug!(
                number = tip.number,
                hash = %short_hash(&tip.hash),
                ancestor = evaluation.ancestor.number(),
                "stored side chain"
            );
            let _ = self.events.send(ChainEvent::SideChain {
                number: tip.number,
                hash: tip.hash,
                ancestor: evaluation.ancestor.number(),
            });
            return Ok(());
        }

        for (number, hash) in &evaluation.ancestor.branch {
            write.set_canonical(*number, *hash);
        }
        for header in prepared.new {
            write.set_canonical(header.number, header.hash);
        }
        for number in tip.number.saturating_add(1)..=previous.number {
            write.delete_canonical(number);
        }
        write.set_head_block(tip.hash).set_head_header(tip.hash);
        self.db.commit(&write)?;

        *self.heads.write() = Heads {
            block: tip.clone(),
            header: tip.clone(),
        };

        let reorg_depth = evaluation.reorg_depth();
        self.metrics.head_number.set(tip.number as i64);
        self.metrics.reorg_depth.observe(reorg_depth as f64);

        if reorg_depth > 0 {
            info!(
                number = tip.number,
                hash = %short_hash(&tip.hash),
                ancestor = evaluation.ancestor.number(),
                dropped = reorg_depth,
                "chain reorganised"
            );
        } else {
            debug!(number = tip.number, hash = %short_hash(&tip.hash), "extended canonical chain");
        }

        let _ = self.events.send(ChainEvent::HeadChanged {
            number: tip.number,
            hash: tip.hash,
            previous: previous.hash,
            reorg_depth,
        });
        Ok(())
    }

    // -- Freezer --------------------------------------------------------------

    /// Move canonical headers older than `head - keep_recent` into the
    /// ancient tier. Returns the number of frozen headers.
    pub fn freeze(&self, keep_recent: u64) -> ChainResult<u64> {
        let _guard = self.insert_lock.lock();
        let limit = self.current_block().number.saturating_sub(keep_recent);
        Ok(self.db.freeze(limit)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::generator::ChainGenerator;
    use crate::config::GENESIS_DIFFICULTY;

    // -- Helpers ------------------------------------------------------------

    fn new_chain(enabled: bool) -> Blockchain {
        let db = Arc::new(ChainDb::open_temporary().unwrap());
        let mut config = ChainConfig::default();
        config.finality.enabled = enabled;
        Blockchain::new(db, Header::genesis(0, GENESIS_DIFFICULTY), config).unwrap()
    }

    fn extend(chain: &Blockchain, count: usize, offset: i64) -> Vec<Header> {
        let headers =
            ChainGenerator::default().generate_with_offset(&chain.current_block(), count, offset);
        chain.insert_segment(&headers).expect("extension should insert");
        headers
    }

    // -- Tests --------------------------------------------------------------

    #[test]
    fn new_chain_starts_at_genesis() {
        let chain = new_chain(false);
        assert_eq!(chain.current_block(), *chain.genesis());
        assert_eq!(chain.current_header(), *chain.genesis());
        assert_eq!(
            chain.total_difficulty(&chain.genesis().hash).unwrap(),
            Some(GENESIS_DIFFICULTY)
        );
        assert_eq!(chain.metrics().head_number.get(), 0);
    }

    #[test]
    fn extension_switches_head() {
        let chain = new_chain(true);
        let headers = extend(&chain, 5, 0);

        assert_eq!(chain.current_block(), headers[4]);
        assert_eq!(chain.current_header(), headers[4]);
        assert_eq!(chain.canonical_header(3).unwrap(), Some(headers[2].clone()));
        assert_eq!(chain.metrics().head_switches_total.get(), 1);
    }

    #[test]
    fn empty_and_known_segments_are_noops() {
        let chain = new_chain(true);
        let headers = extend(&chain, 3, 0);

        let empty = chain.insert_segment(&[]).unwrap();
        assert!(empty.decision.is_none());

        let again = chain.insert_segment(&headers).unwrap();
        assert!(again.decision.is_none());
        assert_eq!(again.known, 3);
        assert_eq!(again.head, headers[2].hash);
    }

    #[test]
    fn known_prefix_is_skipped() {
        let chain = new_chain(false);
        let first = extend(&chain, 3, 0);
        let more = ChainGenerator::default().generate_with_offset(&first[2], 2, 0);

        let mut segment = first.clone();
        segment.extend(more.iter().cloned());
        let summary = chain.insert_segment(&segment).unwrap();

        assert_eq!(summary.known, 3);
        assert_eq!(summary.written, 2);
        assert_eq!(summary.head, more[1].hash);
    }

    #[test]
    fn broken_link_reports_index() {
        let chain = new_chain(false);
        let generator = ChainGenerator::default();
        let mut headers = generator.generate_with_offset(chain.genesis(), 4, 0);
        headers[2] = generator.generate_with_offset(chain.genesis(), 1, 5)[0].clone();

        let err = chain.insert_segment(&headers).expect_err("broken segment");
        assert_eq!(err.index, 2);
        assert!(matches!(err.error, ChainError::Validation(_)));
        assert_eq!(chain.current_block(), *chain.genesis());
        assert_eq!(chain.metrics().validation_failures_total.get(), 1);
    }

    #[test]
    fn bad_difficulty_reports_index() {
        let chain = new_chain(false);
        let generator = ChainGenerator::default();
        let good = generator.generate_with_offset(chain.genesis(), 2, 0);
        let forged = Header::new(&good[1], good[1].timestamp + 10, 1, 0);

        let err = chain
            .insert_segment(&[good[0].clone(), good[1].clone(), forged])
            .expect_err("forged difficulty");
        assert_eq!(err.index, 2);
        assert!(matches!(
            err.error,
            ChainError::Validation(ValidationError::DifficultyMismatch { number: 3, .. })
        ));
        assert!(!chain.db().has_header(&good[0].hash).unwrap());
    }

    #[test]
    fn max_height_segment_is_a_validation_error() {
        let chain = new_chain(false);
        let mut top = ChainGenerator::default()
            .generate_with_offset(chain.genesis(), 1, 0)
            .remove(0);
        top.number = u64::MAX;
        top.hash = top.compute_hash();
        let mut next = top.clone();
        next.number = 0;
        next.parent_hash = top.hash;
        next.timestamp += 10;
        next.hash = next.compute_hash();

        let err = chain.insert_segment(&[top, next]).expect_err("no height after u64::MAX");
        assert_eq!(err.index, 1);
        assert!(matches!(
            err.error,
            ChainError::Validation(ValidationError::NonSequential { got: 0, .. })
        ));
        assert_eq!(chain.current_block(), *chain.genesis());
    }

    #[test]
    fn orphan_segment_is_unknown_ancestor() {
        let chain = new_chain(false);
        let stranger = Header::genesis(99, GENESIS_DIFFICULTY);
        let orphans = ChainGenerator::default().generate_with_offset(&stranger, 3, 0);

        let err = chain.insert_segment(&orphans).expect_err("no ancestor");
        assert_eq!(err.index, 0);
        assert!(err.error.is_unknown_ancestor());
        assert!(matches!(
            err.error,
            ChainError::UnknownParent { hash } if hash == stranger.hash
        ));
        assert!(!err.to_string().contains("forks must branch"));
        assert_eq!(chain.metrics().unknown_ancestors_total.get(), 1);
    }

    #[test]
    fn lighter_fork_becomes_side_chain() {
        let chain = new_chain(false);
        let canonical = extend(&chain, 10, 0);
        let fork = ChainGenerator::default().generate_with_offset(&canonical[4], 3, 20);

        let summary = chain.insert_segment(&fork).unwrap();
        assert_eq!(summary.decision, Some(Decision::SideChainAccepted));
        assert_eq!(chain.current_block(), canonical[9]);
        assert!(chain.db().has_header(&fork[2].hash).unwrap());
        assert!(!chain.db().is_canonical(&fork[0]).unwrap());
    }

    #[test]
    fn side_chain_can_later_win() {
        let chain = new_chain(false);
        let canonical = extend(&chain, 6, 0);
        let generator = ChainGenerator::default();

        let fork = generator.generate_with_offset(&canonical[2], 3, 0);
        let summary = chain.insert_segment(&fork).unwrap();
        assert_eq!(summary.decision, Some(Decision::SideChainAccepted));

        // Extending the stored side chain makes it heavier than the head.
        let more = generator.generate_with_offset(&fork[2], 3, -5);
        let mut events = chain.subscribe();
        let summary = chain.insert_segment(&more).unwrap();
        assert_eq!(summary.decision, Some(Decision::HeadSwitch));

        // The stored side headers were promoted along with the new ones.
        for header in fork.iter().chain(more.iter()) {
            assert!(chain.db().is_canonical(header).unwrap());
        }
        assert!(!chain.db().is_canonical(&canonical[4]).unwrap());

        match events.try_recv().unwrap() {
            ChainEvent::HeadChanged {
                reorg_depth,
                previous,
                ..
            } => {
                assert_eq!(reorg_depth, 3);
                assert_eq!(previous, canonical[5].hash);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn shorter_heavier_fork_drops_stale_canonical_entries() {
        let chain = new_chain(false);
        // Very slow canonical blocks bleed difficulty at the maximum rate.
        let canonical = extend(&chain, 10, 990);
        let fork = ChainGenerator::default().generate_with_offset(&canonical[1], 7, -9);

        let summary = chain.insert_segment(&fork).unwrap();
        assert_eq!(summary.decision, Some(Decision::HeadSwitch));
        assert_eq!(chain.current_block(), fork[6]);
        assert_eq!(chain.canonical_header(9).unwrap(), Some(fork[6].clone()));
        assert!(chain.canonical_header(10).unwrap().is_none());
        assert!(chain.db().has_header(&canonical[9].hash).unwrap());
    }

    #[test]
    fn toggle_changes_outcome_for_later_evaluations() {
        let chain = new_chain(false);
        let canonical = extend(&chain, 500, 0);
        let fork = ChainGenerator::default().generate_with_offset(&canonical[299], 200, -9);

        chain.set_artificial_finality_enabled(true);
        assert!(chain.is_artificial_finality_enabled());
        let evaluation = chain.evaluate_segment(&fork).unwrap().unwrap();
        assert!(!evaluation.decision.is_accepted());
        assert!(evaluation.required_ratio().is_some());

        chain.set_artificial_finality_enabled(false);
        let evaluation = chain.evaluate_segment(&fork).unwrap().unwrap();
        assert!(evaluation.decision.is_head_switch());
        assert!(evaluation.required_ratio().is_none());

        // Dry runs never write.
        assert!(!chain.db().has_header(&fork[0].hash).unwrap());
    }

    #[test]
    fn rejected_segment_writes_nothing() {
        let chain = new_chain(true);
        let canonical = extend(&chain, 500, 0);
        let fork = ChainGenerator::default().generate_with_offset(&canonical[299], 200, -9);

        let err = chain.insert_segment(&fork).expect_err("gate should refuse");
        // #491 is the first fork header heavier than the head.
        assert_eq!(err.index, 190);
        let rejection = err.rejection().expect("rejection details");
        assert_eq!(rejection.ancestor_number, 300);
        assert_eq!(rejection.number, 491);
        assert_eq!(rejection.hash, fork[190].hash);

        assert_eq!(chain.current_block(), canonical[499]);
        assert!(!chain.db().has_header(&fork[0].hash).unwrap());
        assert_eq!(chain.metrics().finality_rejections_total.get(), 1);
    }

    #[test]
    fn set_finality_config_validates() {
        let chain = new_chain(false);
        let mut bad = chain.finality_config();
        bad.ceiling = 0.0;
        assert!(chain.set_finality_config(bad).is_err());

        let good = FinalityConfig::enabled();
        chain.set_finality_config(good).unwrap();
        assert_eq!(chain.finality_config(), good);
        assert!((chain.required_ratio(0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn diagnostics_ratio_uses_stored_tds() {
        let chain = new_chain(false);
        let canonical = extend(&chain, 4, 0);
        let ratio = chain
            .total_difficulty_ratio(&canonical[0], &canonical[3], &canonical[3])
            .unwrap();
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn reopen_restores_heads() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = Header::genesis(0, GENESIS_DIFFICULTY);
        let tip = {
            let db = Arc::new(ChainDb::open(dir.path()).unwrap());
            let chain = Blockchain::new(db, genesis.clone(), ChainConfig::default()).unwrap();
            let headers = extend(&chain, 5, 0);
            chain.db().flush().unwrap();
            headers[4].clone()
        };

        let db = Arc::new(ChainDb::open(dir.path()).unwrap());
        let chain = Blockchain::new(db, genesis, ChainConfig::default()).unwrap();
        assert_eq!(chain.current_block(), tip);
        assert_eq!(chain.metrics().head_number.get(), 5);
    }

    #[test]
    fn reopen_with_other_genesis_fails() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Arc::new(ChainDb::open(dir.path()).unwrap());
            Blockchain::new(db, Header::genesis(0, GENESIS_DIFFICULTY), ChainConfig::default())
                .unwrap();
        }
        let db = Arc::new(ChainDb::open(dir.path()).unwrap());
        let result = Blockchain::new(db, Header::genesis(1, GENESIS_DIFFICULTY), ChainConfig::default());
        assert!(matches!(result, Err(ChainError::GenesisMismatch { .. })));
    }
}
