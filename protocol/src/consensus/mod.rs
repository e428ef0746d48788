//! # Consensus Rules
//!
//! The pass-through validation that runs on every header before chain
//! selection looks at it. Nothing here decides between forks; that is the
//! job of [`crate::finality`] and [`crate::chain`].
//!
//! ## Architecture
//!
//! ```text
//! difficulty.rs  DifficultyCalculator (Homestead-style retargeting)
//! validation.rs  structural segment checks + HeaderValidator trait
//! ```

pub mod difficulty;
pub mod validation;

pub use difficulty::DifficultyCalculator;
pub use validation::{check_segment, DifficultyValidator, HeaderValidator, ValidationError};
