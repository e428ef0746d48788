//! Deterministic header-chain generation.
//!
//! Builds runs of valid headers on top of any parent: each block is sealed
//! `interval + offset` seconds after its parent with the difficulty the
//! calculator demands for that spacing. A negative offset makes blocks come
//! faster (and heavier); a positive one makes them slower (and lighter).
//! Nonces are random unless set, so two runs from the same parent with the
//! same timing are still distinct chains.

use crate::config::{DifficultyConfig, TARGET_BLOCK_INTERVAL_SECS};
use crate::consensus::DifficultyCalculator;
use crate::storage::Header;

/// Per-block knobs handed to the generator callback.
#[derive(Debug, Clone, Copy)]
pub struct BlockBuilder {
    number: u64,
    offset: i64,
    nonce: u64,
}

impl BlockBuilder {
    /// Height of the block being built.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Shift this block's timestamp relative to the target spacing.
    pub fn offset_time(&mut self, seconds: i64) {
        self.offset = seconds;
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChainGenerator {
    calculator: DifficultyCalculator,
    interval: u64,
}

impl Default for ChainGenerator {
    fn default() -> Self {
        Self::new(DifficultyConfig::default())
    }
}

impl ChainGenerator {
    pub fn new(config: DifficultyConfig) -> Self {
        Self {
            calculator: DifficultyCalculator::new(config),
            interval: TARGET_BLOCK_INTERVAL_SECS,
        }
    }

    pub fn with_interval(mut self, seconds: u64) -> Self {
        self.interval = seconds;
        self
    }

    /// Generate `count` headers on top of `parent`, letting `configure`
    /// adjust each block before it is sealed.
    ///
    /// Spacing never drops below one second, so timestamps always increase.
    pub fn generate<F>(&self, parent: &Header, count: usize, mut configure: F) -> Vec<Header>
    where
        F: FnMut(usize, &mut BlockBuilder),
    {
        let mut headers = Vec::with_capacity(count);
        let mut prev = parent.clone();

        for i in 0..count {
            let mut builder = BlockBuilder {
                number: prev.number + 1,
                offset: 0,
                nonce: rand::random(),
            };
            configure(i, &mut builder);

            let spacing = (self.interval as i64).saturating_add(builder.offset).max(1) as u64;
            let timestamp = prev.timestamp + spacing;
            let difficulty = self.calculator.calculate(&prev, timestamp);
            let header = Header::new(&prev, timestamp, difficulty, builder.nonce);

            headers.push(header.clone());
            prev = header;
        }
        headers
    }

    /// Generate `count` headers, every one shifted by `offset` seconds.
    pub fn generate_with_offset(&self, parent: &Header, count: usize, offset: i64) -> Vec<Header> {
        self.generate(parent, count, |_, block| block.offset_time(offset))
    }
}
