//! Difficulty adjustment.
//!
//! Homestead-style retargeting: every `duration_limit` seconds of spacing
//! beyond the first pushes difficulty down one step of
//! `parent / bound_divisor`, a block inside the first window pushes it up
//! one step, and no single block can drop it by more than `max_decrease`
//! steps. The result never goes below `minimum`.

use crate::config::DifficultyConfig;
use crate::storage::{Difficulty, Header};

/// Difficulty adjustment calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifficultyCalculator {
    config: DifficultyConfig,
}

impl DifficultyCalculator {
    pub fn new(config: DifficultyConfig) -> Self {
        Self { config }
    }

    pub fn minimum(&self) -> Difficulty {
        self.config.minimum
    }

    /// Difficulty required of a child of `parent` sealed at `timestamp`.
    pub fn calculate(&self, parent: &Header, timestamp: u64) -> Difficulty {
        let elapsed = timestamp.saturating_sub(parent.timestamp);
        let windows = i128::from(elapsed / self.config.duration_limit);
        let adjustment = (1 - windows).max(-self.config.max_decrease);

        let step = parent.difficulty / self.config.bound_divisor;
        let magnitude = step.saturating_mul(adjustment.unsigned_abs());
        let next = if adjustment >= 0 {
            parent.difficulty.saturating_add(magnitude)
        } else {
            parent.difficulty.saturating_sub(magnitude)
        };

        next.max(self.config.minimum)
    }
}
